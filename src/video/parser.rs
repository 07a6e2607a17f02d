//! Orchestrates the external audio-extractor and ASR binaries, plus
//! keyframe extraction, to turn a video file into a [`ParseResult`].
//! Both external tools are optional; whichever is unconfigured is simply
//! skipped rather than treated as an error.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::config::VideoConfig;
use crate::error::{CoreError, Result};
use crate::types::{Keyframe, ParseResult, TranscriptSegment, TranscriptSegmentText};

const SHELL_METACHARACTERS: &[char] = &['|', ';', '&', '$', '`'];

fn reject_shell_metacharacters(path: &Path) -> Result<()> {
    let s = path.to_string_lossy();
    if s.chars().any(|c| SHELL_METACHARACTERS.contains(&c)) {
        return Err(CoreError::Validation(format!("path contains a shell metacharacter: {s}")));
    }
    Ok(())
}

/// Runs the configured audio extractor to produce 16 kHz mono PCM at
/// `output_path`. Non-fatal on failure — callers treat a missing output
/// file as "no transcript available".
async fn extract_audio(extractor_path: &str, video_path: &Path, output_path: &Path) -> Result<()> {
    reject_shell_metacharacters(video_path)?;
    reject_shell_metacharacters(output_path)?;

    let status = tokio::process::Command::new(extractor_path)
        .args([
            "-i",
            video_path.to_str().ok_or_else(|| CoreError::Validation("video path is not valid UTF-8".to_string()))?,
            "-ar",
            "16000",
            "-ac",
            "1",
            "-f",
            "s16le",
            output_path.to_str().ok_or_else(|| CoreError::Validation("output path is not valid UTF-8".to_string()))?,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;

    if !status.success() {
        return Err(CoreError::Parse(format!("audio extractor exited with {status}")));
    }
    Ok(())
}

/// Keyword blacklist for ASR binaries that interleave progress/diagnostic
/// output with transcript text on stdout.
const LOG_LINE_KEYWORDS: &[&str] = &[
    "processing time",
    "encoder",
    "model path",
    "rtf",
    "gpu",
    "cpu",
    "gguf",
    "ggml",
    "loading",
    "whisper_",
    "system_info",
];

fn is_log_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    if LOG_LINE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return true;
    }
    is_numeric_prefixed_metric(&lower)
}

/// Matches lines like `3. decode time : 120ms` — a numbered diagnostic
/// metric rather than transcript text.
fn is_numeric_prefixed_metric(lower_line: &str) -> bool {
    let Some((prefix, rest)) = lower_line.split_once('.') else { return false };
    if prefix.trim().is_empty() || !prefix.trim().chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    rest.contains(':') && rest.chars().any(|c| c.is_ascii_digit())
}

/// Runs the configured ASR binary over `audio_path` and filters its stdout
/// down to transcript text. Timestamps are unknown at this stage (`start =
/// end = 0.0`); the pipeline synthesizes them from the video duration.
async fn transcribe(asr_binary_path: &str, asr_model_path: &str, audio_path: &Path) -> Result<Vec<TranscriptSegmentText>> {
    reject_shell_metacharacters(audio_path)?;

    let output = tokio::process::Command::new(asr_binary_path)
        .args(["-m", asr_model_path, "-f", audio_path.to_str().ok_or_else(|| CoreError::Validation("audio path is not valid UTF-8".to_string()))?])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(CoreError::Parse(format!("ASR binary exited with {}", output.status)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut text = String::new();
    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_log_line(trimmed) {
            continue;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(trimmed);
    }

    if text.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![TranscriptSegmentText { start: 0.0, end: 0.0, text }])
}

/// Runs the configured keyframe extractor at `1/interval` fps and reads
/// back every `frame_NNNN.jpg` it produced, synthesizing a timestamp from
/// its position since the extractor itself reports none.
async fn extract_keyframes(extractor_path: &str, video_path: &Path, output_dir: &Path, interval_secs: u32) -> Result<Vec<Keyframe>> {
    reject_shell_metacharacters(video_path)?;
    reject_shell_metacharacters(output_dir)?;

    let filter = format!("fps=1/{interval_secs}");
    let status = tokio::process::Command::new(extractor_path)
        .args([
            "-i",
            video_path.to_str().ok_or_else(|| CoreError::Validation("video path is not valid UTF-8".to_string()))?,
            "-vf",
            &filter,
            "-q:v",
            "2",
            &output_dir.join("frame_%04d.jpg").to_string_lossy(),
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;

    if !status.success() {
        return Err(CoreError::Parse(format!("keyframe extractor exited with {status}")));
    }

    read_keyframes_from_dir(output_dir, interval_secs)
}

/// Timestamp the extractor itself doesn't report: frame `i` of an
/// `interval_secs`-spaced extraction landed at `i * interval_secs`.
fn keyframe_timestamp(index: u32, interval_secs: u32) -> f64 {
    (index * interval_secs) as f64
}

/// Reads back every `frame_NNNN.jpg` the extractor wrote to `output_dir`, in
/// filename order, assigning each a synthesized timestamp.
fn read_keyframes_from_dir(output_dir: &Path, interval_secs: u32) -> Result<Vec<Keyframe>> {
    let mut frame_paths: Vec<PathBuf> = std::fs::read_dir(output_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("frame_") && n.ends_with(".jpg")))
        .collect();
    frame_paths.sort();

    let mut keyframes = Vec::with_capacity(frame_paths.len());
    for (i, path) in frame_paths.into_iter().enumerate() {
        let data = std::fs::read(&path)?;
        keyframes.push(Keyframe { timestamp: keyframe_timestamp(i as u32, interval_secs), filepath: path, data });
    }
    Ok(keyframes)
}

/// Best-effort parse of `ffmpeg`-style stderr for a `Duration: HH:MM:SS.xx`
/// line. Returns 0.0 on any failure to parse — duration is advisory, never
/// load-bearing for correctness.
fn parse_duration_from_stderr(stderr: &str) -> f64 {
    let Some(idx) = stderr.find("Duration: ") else { return 0.0 };
    let rest = &stderr[idx + "Duration: ".len()..];
    let end = rest.find(',').unwrap_or(rest.len());
    let timestamp = &rest[..end];
    let parts: Vec<&str> = timestamp.split(':').collect();
    if parts.len() != 3 {
        return 0.0;
    }
    let hours: f64 = parts[0].trim().parse().unwrap_or(0.0);
    let minutes: f64 = parts[1].trim().parse().unwrap_or(0.0);
    let seconds: f64 = parts[2].trim().parse().unwrap_or(0.0);
    hours * 3600.0 + minutes * 60.0 + seconds
}

async fn probe_duration(extractor_path: &str, video_path: &Path) -> f64 {
    if reject_shell_metacharacters(video_path).is_err() {
        return 0.0;
    }
    let Some(video_path_str) = video_path.to_str() else { return 0.0 };
    let output = tokio::process::Command::new(extractor_path)
        .args(["-i", video_path_str])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;
    match output {
        Ok(output) => parse_duration_from_stderr(&String::from_utf8_lossy(&output.stderr)),
        Err(_) => 0.0,
    }
}

/// Runs the full video-to-`ParseResult` pipeline in a scratch temp
/// directory, which is always removed on exit regardless of which steps
/// succeeded.
pub async fn parse(video_path: &Path, config: &VideoConfig) -> Result<ParseResult> {
    let temp_dir = std::env::temp_dir().join(format!("ingestcore_video_{}", crate::sanitize::generate_doc_id()));
    std::fs::create_dir_all(&temp_dir)?;

    let result = parse_in(video_path, config, &temp_dir).await;

    if let Err(e) = std::fs::remove_dir_all(&temp_dir) {
        tracing::warn!(error = %e, "failed to remove video parser temp directory");
    }

    result
}

async fn parse_in(video_path: &Path, config: &VideoConfig, temp_dir: &Path) -> Result<ParseResult> {
    let probe_tool = if !config.audio_extractor_path.is_empty() { &config.audio_extractor_path } else { &config.keyframe_extractor_path };
    let duration = if probe_tool.is_empty() { 0.0 } else { probe_duration(probe_tool, video_path).await };

    let mut transcript = Vec::new();
    if !config.audio_extractor_path.is_empty() && !config.asr_binary_path.is_empty() {
        let audio_path = temp_dir.join("audio.pcm");
        match extract_audio(&config.audio_extractor_path, video_path, &audio_path).await {
            Ok(()) => match transcribe(&config.asr_binary_path, &config.asr_model_path, &audio_path).await {
                Ok(segments) => transcript = segments,
                Err(e) => tracing::warn!(error = %e, "ASR transcription failed, continuing without transcript"),
            },
            Err(e) => tracing::warn!(error = %e, "audio extraction failed, continuing without transcript"),
        }
    }

    let mut keyframes = Vec::new();
    if !config.keyframe_extractor_path.is_empty() {
        let frames_dir = temp_dir.join("frames");
        std::fs::create_dir_all(&frames_dir)?;
        match extract_keyframes(&config.keyframe_extractor_path, video_path, &frames_dir, config.clamped_keyframe_interval()).await {
            Ok(frames) => keyframes = frames,
            Err(e) => tracing::warn!(error = %e, "keyframe extraction failed, continuing without keyframes"),
        }
    }

    Ok(ParseResult { transcript, keyframes, duration })
}

/// Synthesizes a `[start, end]` time range for a transcript segment whose
/// ASR timing was unknown (`start == end == 0.0`), from the overall video
/// duration. Kept separate from `parse` so the pipeline can apply it once
/// the real segment boundaries are known.
#[allow(dead_code)]
pub fn synthesize_range(segment: TranscriptSegment, duration: f64) -> TranscriptSegment {
    if segment.start == 0.0 && segment.end == 0.0 {
        TranscriptSegment { start: 0.0, end: duration }
    } else {
        segment
    }
}
