//! CLI output formatting for every command.
//!
//! # Frame-First Display
//!
//! Every frame is shown by its id and relative path. Roots are marked as
//! such; children name the parent they are diffed against. Counts and byte
//! totals close each section.
//!
//! # Output Format
//!
//! ## Encode progress
//!
//! ```text
//! Found 4 frames
//! Scoring 6 pairs on 2 workers
//!     6/6 pairs scored
//! Plan: 1 root, 3 diffs
//!     root 0001.png
//! Encoding 3 diffs on 4 workers
//!     1/3 0002.png (12 changed pixels, 1.2 KB)
//!     2/3 0004.png FAILED: Failed to decode ...
//! ```
//!
//! ## Encode summary
//!
//! ```text
//! Archive: clip.dia
//!     Frames: 4
//!     Roots: 1
//!     Diffs: 2 (2.4 KB)
//!     Failed: 1
//!         003 0004.png: Failed to decode ...
//! ```
//!
//! ## List
//!
//! ```text
//! 000 0001.png  root
//! 001 0002.png  ← 000 (depth 1)
//!
//! 2 frames, 1 root, longest chain 1
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::process::{ProcessEvent, ProcessResult};
use crate::reconstruct::FrameEntry;
use crate::types::FrameId;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a frame id as 3-digit zero-padded.
fn format_id(id: FrameId) -> String {
    format!("{:0>3}", id)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Human-readable byte count, base 1024.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

// ============================================================================
// encode / plan progress
// ============================================================================

/// Scoring reports one event per pair; print about one line per percent.
fn is_progress_milestone(done: usize, total: usize) -> bool {
    let step = (total / 100).max(1);
    done % step == 0 || done == total
}

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::FramesFound { count } => {
            vec![format!("Found {}", plural(*count, "frame", "frames"))]
        }
        ProcessEvent::ScoringStarted { pairs, workers } => vec![format!(
            "Scoring {} on {}",
            plural(*pairs, "pair", "pairs"),
            plural(*workers, "worker", "workers")
        )],
        ProcessEvent::PairsScored {
            done,
            total,
            failed,
        } => {
            if !is_progress_milestone(*done, *total) {
                Vec::new()
            } else if *failed == 0 {
                vec![format!("    {done}/{total} pairs scored")]
            } else {
                vec![format!("    {done}/{total} pairs scored, {failed} skipped")]
            }
        }
        ProcessEvent::Planned { roots, diffs } => vec![format!(
            "Plan: {}, {}",
            plural(*roots, "root", "roots"),
            plural(*diffs, "diff", "diffs")
        )],
        ProcessEvent::RootCopied { path } => vec![format!("    root {path}")],
        ProcessEvent::EncodingStarted { diffs, workers } => vec![format!(
            "Encoding {} on {}",
            plural(*diffs, "diff", "diffs"),
            plural(*workers, "worker", "workers")
        )],
        ProcessEvent::FrameEncoded {
            done,
            total,
            path,
            stats,
        } => vec![format!(
            "    {done}/{total} {path} ({}, {})",
            plural(stats.opaque_pixels as usize, "changed pixel", "changed pixels"),
            format_bytes(stats.bytes)
        )],
        ProcessEvent::FrameFailed {
            done,
            total,
            path,
            reason,
        } => vec![format!("    {done}/{total} {path} FAILED: {reason}")],
        ProcessEvent::ArchiveWritten { path, entries } => vec![format!(
            "Wrote {} ({})",
            path.display(),
            plural(*entries, "entry", "entries")
        )],
    }
}

// ============================================================================
// encode summary
// ============================================================================

/// Format the end-of-run summary.
pub fn format_encode_summary(result: &ProcessResult) -> Vec<String> {
    let mut lines = vec![
        format!("Archive: {}", result.archive.display()),
        format!("    Frames: {}", result.manifest.frame_count()),
        format!("    Roots: {}", result.roots_copied),
        format!(
            "    Diffs: {} ({})",
            result.diffs_encoded,
            format_bytes(result.diff_bytes)
        ),
    ];
    if !result.failed.is_empty() {
        lines.push(format!("    Failed: {}", result.failed.len()));
        for f in &result.failed {
            lines.push(format!("        {} {}: {}", format_id(f.id), f.path, f.reason));
        }
    }
    lines
}

pub fn print_encode_summary(result: &ProcessResult) {
    for line in format_encode_summary(result) {
        println!("{}", line);
    }
}

// ============================================================================
// list
// ============================================================================

/// Format the frame table of an archive, one line per frame.
pub fn format_frame_list(entries: &[FrameEntry]) -> Vec<String> {
    let width = entries.iter().map(|e| e.path.len()).max().unwrap_or(0);
    let mut lines: Vec<String> = entries
        .iter()
        .map(|e| {
            let relation = match e.parent {
                None => "root".to_string(),
                Some(p) => format!("← {} (depth {})", format_id(p), e.depth),
            };
            format!("{} {:<width$}  {}", format_id(e.id), e.path, relation)
        })
        .collect();

    let roots = entries.iter().filter(|e| e.parent.is_none()).count();
    let deepest = entries.iter().map(|e| e.depth).max().unwrap_or(0);
    lines.push(String::new());
    lines.push(format!(
        "{}, {}, longest chain {}",
        plural(entries.len(), "frame", "frames"),
        plural(roots, "root", "roots"),
        deepest
    ));
    lines
}

pub fn print_frame_list(entries: &[FrameEntry]) {
    for line in format_frame_list(entries) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::DiffStats;
    use crate::manifest::Manifest;
    use crate::process::FailedFrame;
    use std::path::PathBuf;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_id_pads() {
        assert_eq!(format_id(1), "001");
        assert_eq!(format_id(1234), "1234");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "frame", "frames"), "1 frame");
        assert_eq!(plural(0, "frame", "frames"), "0 frames");
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    // =========================================================================
    // Progress events
    // =========================================================================

    #[test]
    fn scoring_events() {
        assert_eq!(
            format_process_event(&ProcessEvent::ScoringStarted {
                pairs: 6,
                workers: 1
            }),
            vec!["Scoring 6 pairs on 1 worker"]
        );
        assert_eq!(
            format_process_event(&ProcessEvent::PairsScored {
                done: 3,
                total: 6,
                failed: 0
            }),
            vec!["    3/6 pairs scored"]
        );
        assert_eq!(
            format_process_event(&ProcessEvent::PairsScored {
                done: 6,
                total: 6,
                failed: 2
            }),
            vec!["    6/6 pairs scored, 2 skipped"]
        );
    }

    #[test]
    fn pair_progress_prints_about_once_per_percent() {
        assert!(is_progress_milestone(1, 3));
        assert!(is_progress_milestone(3, 3));
        assert!(!is_progress_milestone(1, 1000));
        assert!(is_progress_milestone(10, 1000));
        assert!(is_progress_milestone(1000, 1000));

        let printed = (1..=1000)
            .filter(|&done| {
                !format_process_event(&ProcessEvent::PairsScored {
                    done,
                    total: 1000,
                    failed: 0,
                })
                .is_empty()
            })
            .count();
        assert_eq!(printed, 100);
    }

    #[test]
    fn between_milestones_prints_nothing() {
        let event = ProcessEvent::PairsScored {
            done: 7,
            total: 1000,
            failed: 1,
        };
        assert!(format_process_event(&event).is_empty());
    }

    #[test]
    fn frame_encoded_event() {
        let event = ProcessEvent::FrameEncoded {
            done: 1,
            total: 3,
            path: "0002.png".into(),
            stats: DiffStats {
                width: 10,
                height: 10,
                opaque_pixels: 1,
                bytes: 2048,
            },
        };
        assert_eq!(
            format_process_event(&event),
            vec!["    1/3 0002.png (1 changed pixel, 2.0 KB)"]
        );
    }

    #[test]
    fn frame_failed_event() {
        let event = ProcessEvent::FrameFailed {
            done: 2,
            total: 3,
            path: "0004.png".into(),
            reason: "bad data".into(),
        };
        assert_eq!(
            format_process_event(&event),
            vec!["    2/3 0004.png FAILED: bad data"]
        );
    }

    #[test]
    fn plan_event() {
        assert_eq!(
            format_process_event(&ProcessEvent::Planned { roots: 1, diffs: 3 }),
            vec!["Plan: 1 root, 3 diffs"]
        );
    }

    // =========================================================================
    // Summary and listing
    // =========================================================================

    #[test]
    fn encode_summary_lists_failures() {
        let mut manifest = Manifest::default();
        for id in 0..3 {
            manifest
                .image_map
                .insert(id.to_string(), format!("{id}.png"));
        }
        let result = ProcessResult {
            manifest,
            archive: PathBuf::from("clip.dia"),
            roots_copied: 1,
            diffs_encoded: 1,
            diff_bytes: 100,
            failed: vec![FailedFrame {
                id: 2,
                path: "2.png".into(),
                reason: "boom".into(),
            }],
        };
        assert_eq!(
            format_encode_summary(&result),
            vec![
                "Archive: clip.dia",
                "    Frames: 3",
                "    Roots: 1",
                "    Diffs: 1 (100 B)",
                "    Failed: 1",
                "        002 2.png: boom",
            ]
        );
    }

    #[test]
    fn frame_list_aligns_paths() {
        let entries = vec![
            FrameEntry {
                id: 0,
                path: "a.png".into(),
                parent: None,
                depth: 0,
            },
            FrameEntry {
                id: 1,
                path: "long/b.png".into(),
                parent: Some(0),
                depth: 1,
            },
        ];
        assert_eq!(
            format_frame_list(&entries),
            vec![
                "000 a.png       root",
                "001 long/b.png  ← 000 (depth 1)",
                "",
                "2 frames, 1 root, longest chain 1",
            ]
        );
    }
}
