use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use vmix_media::WaitPolicy;
use vmix_ml_client::{NeutralOracle, SemanticRelevance};
use vmix_models::{PlatformProfile, VideoCandidate};
use vmix_worker::{
    CandidateLocator, CandidateMode, CandidateSelector, DenyList, Manifest, NoCandidateFeatures,
    Pipeline, RunRequest, VideoPrompt, WorkerConfig,
};

fn config(dir: &TempDir) -> WorkerConfig {
    WorkerConfig {
        output_dir: dir.path().join("run"),
        shared_output_dir: dir.path().join("shared"),
        wait_timeout: Duration::from_millis(50),
        fallback_wait_timeout: Duration::from_millis(20),
        poll_interval: Duration::from_millis(10),
        min_candidate_bytes: 1,
        ..Default::default()
    }
}

fn pipeline(config: WorkerConfig) -> Pipeline {
    let locator = CandidateLocator::new(&config.output_dir, &config.shared_output_dir).with_wait(
        WaitPolicy {
            timeout: config.wait_timeout,
            poll_interval: config.poll_interval,
            min_bytes: config.min_candidate_bytes,
        },
        config.fallback_wait_timeout,
    );
    let selector = CandidateSelector::new(
        Arc::new(NeutralOracle),
        SemanticRelevance::disabled("test"),
        Arc::new(NoCandidateFeatures),
        DenyList::default(),
        locator,
    );
    Pipeline::new(config, selector)
}

fn request(mode: CandidateMode, platforms: &[&str]) -> RunRequest {
    RunRequest {
        audio: None,
        source_video: None,
        lyrics_or_description: "lampu kota, gas terus".to_string(),
        mood: "hype".to_string(),
        caption_seed: Some("follow for part 2".to_string()),
        audio_style: None,
        drum_loop: None,
        remix: false,
        candidates: mode,
        concat_segments: false,
        reference_images: Vec::new(),
        platforms: platforms
            .iter()
            .map(|p| (p.to_string(), PlatformProfile::default()))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[tokio::test]
async fn provided_candidates_penalize_deny_terms() {
    let dir = TempDir::new().unwrap();
    let clips = dir.path().join("clips");
    std::fs::create_dir_all(&clips).unwrap();
    std::fs::write(clips.join("farm.mp4"), b"video").unwrap();
    std::fs::write(clips.join("city.mp4"), b"video").unwrap();

    let videos = vec![
        VideoCandidate::from_path(clips.join("farm.mp4"), "V1").with_prompt("drone over a farm"),
        VideoCandidate::from_path(clips.join("city.mp4"), "V2").with_prompt("city rooftop"),
    ];
    let pipeline = pipeline(config(&dir));
    let report = pipeline
        .run(&request(CandidateMode::Provided { videos }, &["tiktok"]))
        .await
        .unwrap();

    let tiktok = &report.platforms["tiktok"];
    assert_eq!(tiktok.error, None);
    assert_eq!(tiktok.best_video.as_deref(), Some(clips.join("city.mp4").as_path()));
    assert!((tiktok.best_score.unwrap() - 35.0).abs() < 1e-9);
    assert_eq!(tiktok.caption.as_deref(), Some("follow for part 2"));

    let path = pipeline.write_report(&report).await.unwrap();
    assert!(path.ends_with("run_report.json"));
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert!(written["platforms"]["tiktok"]["best_video"].is_string());
}

#[tokio::test]
async fn simulate_then_resume_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let manifest_path = config.manifest_path();
    let pipeline = pipeline(config);

    let prompts = vec![VideoPrompt::new("neon street"), VideoPrompt::new("rooftop dance")];
    let report = pipeline
        .run(&request(CandidateMode::Simulate { prompts }, &["tiktok"]))
        .await
        .unwrap();
    assert_eq!(report.platforms["tiktok"].best_video, None);
    assert_eq!(report.platforms["tiktok"].error, None);

    // Nothing delivered yet: resume without waiting reports pending.
    let report = pipeline
        .run(&request(CandidateMode::Resume { wait: false }, &["tiktok"]))
        .await
        .unwrap();
    let error = report.platforms["tiktok"].error.clone().unwrap();
    assert!(error.contains("resume"), "{}", error);

    // Deliver the second task's clip and resume again.
    let tasks = Manifest::new(&manifest_path).load().await.unwrap();
    std::fs::write(&tasks[1].save_as, b"delivered").unwrap();

    let report = pipeline
        .run(&request(CandidateMode::Resume { wait: true }, &["tiktok"]))
        .await
        .unwrap();
    let tiktok = &report.platforms["tiktok"];
    assert_eq!(tiktok.error, None);
    assert_eq!(tiktok.best_video.as_deref(), Some(tasks[1].save_as.as_path()));
}

#[tokio::test]
async fn one_failing_platform_does_not_stop_others() {
    let dir = TempDir::new().unwrap();
    let clip = dir.path().join("only.mp4");
    std::fs::write(&clip, b"video").unwrap();

    let mut videos = vec![VideoCandidate::from_path(&clip, "V1")];
    videos[0].prompt = "city".to_string();
    let pipeline = pipeline(config(&dir));

    // Resume has no manifest for either platform: both fail independently.
    let report = pipeline
        .run(&request(CandidateMode::Resume { wait: false }, &["reels", "tiktok"]))
        .await
        .unwrap();
    assert_eq!(report.failed_platforms().count(), 2);

    let report = pipeline
        .run(&request(CandidateMode::Provided { videos }, &["reels", "tiktok"]))
        .await
        .unwrap();
    assert_eq!(report.failed_platforms().count(), 0);
    assert_eq!(report.platforms.len(), 2);
}

#[tokio::test]
async fn missing_inputs_fail_before_processing() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(config(&dir));
    let mut req = request(CandidateMode::Resume { wait: false }, &["tiktok"]);
    req.audio = Some(dir.path().join("missing.wav"));

    assert!(pipeline.run(&req).await.is_err());
    assert!(!pipeline.config().report_path().exists());
}
