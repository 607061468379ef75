//! Failure classification.
//!
//! Turns a [`RawFailure`] of any shape into a [`ClassifiedFailure`]:
//!
//! 1. `Structured` → passed through unchanged
//! 2. `Textual` / `Generic` → 500 with the text as message and a stack
//!    captured `skip_frames` frames up
//! 3. `Opaque` → 500 "Unexpected Error Type", full stack, and a description of
//!    the value under `data["_err"]`
//!
//! When the failure carries the stack recorded where it arose (a panic site or
//! a `RawFailure` constructor), that stack is used instead of capturing one.
//!
//! Classification never fails.

use std::any::Any;
use std::backtrace::Backtrace;

use super::classified::ClassifiedFailure;
use super::raw::RawFailure;
use super::status::FailureStatus;

/// Message used for values with no error semantics.
pub const UNEXPECTED_ERROR_TYPE: &str = "Unexpected Error Type";

/// Diagnostic key holding the description of an opaque value.
pub const OPAQUE_VALUE_KEY: &str = "_err";

const UNAVAILABLE_STACK: &str = "<stack trace unavailable>";

/// Classifies a raw failure.
///
/// A stack recorded where the failure arose (`RawFailure::Traced`) is used
/// as is; otherwise one is captured here, `skip_frames` frames up.
pub fn classify(raw: RawFailure, skip_frames: usize) -> ClassifiedFailure {
    classify_with_origin(raw, None, skip_frames)
}

fn classify_with_origin(
    raw: RawFailure,
    origin: Option<Backtrace>,
    skip_frames: usize,
) -> ClassifiedFailure {
    match raw {
        RawFailure::Traced(inner, backtrace) => {
            classify_with_origin(*inner, Some(backtrace), skip_frames)
        }
        RawFailure::Structured(failure) => failure,
        RawFailure::Textual(message) => {
            ClassifiedFailure::new(FailureStatus::INTERNAL_SERVER_ERROR, message)
                .with_stack_trace(stack_for(origin, skip_frames))
        }
        RawFailure::Generic(err) => {
            ClassifiedFailure::new(FailureStatus::INTERNAL_SERVER_ERROR, err.to_string())
                .with_stack_trace(stack_for(origin, skip_frames))
        }
        RawFailure::Opaque(value) => {
            ClassifiedFailure::new(FailureStatus::INTERNAL_SERVER_ERROR, UNEXPECTED_ERROR_TYPE)
                .with_stack_trace(stack_for(origin, 0))
                .with_data(OPAQUE_VALUE_KEY, describe_opaque(value.as_ref()))
        }
    }
}

fn stack_for(origin: Option<Backtrace>, skip_frames: usize) -> String {
    match origin {
        Some(backtrace) => render_origin(&backtrace),
        None => capture_stack(skip_frames),
    }
}

/// Captures the current call stack, dropping backtrace machinery frames and
/// then `skip_frames` caller frames.
///
/// Always returns a non-empty string.
pub fn capture_stack(skip_frames: usize) -> String {
    let rendered = Backtrace::force_capture().to_string();
    non_empty(skip_leading_frames(&rendered, skip_frames, is_capture_frame), rendered)
}

/// Renders a stack recorded at a failure's origin, starting at the first
/// frame outside panic and constructor machinery.
pub fn render_origin(backtrace: &Backtrace) -> String {
    let rendered = backtrace.to_string();
    non_empty(skip_leading_frames(&rendered, 0, is_origin_machinery_frame), rendered)
}

fn non_empty(trimmed: String, rendered: String) -> String {
    if !trimmed.trim().is_empty() {
        trimmed
    } else if !rendered.trim().is_empty() {
        rendered
    } else {
        UNAVAILABLE_STACK.to_string()
    }
}

/// A rendered backtrace frame header looks like `  12: crate::module::function`.
fn is_frame_header(line: &str) -> bool {
    let trimmed = line.trim_start();
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && trimmed[digits..].starts_with(':')
}

fn is_capture_frame(line: &str) -> bool {
    line.contains("std::backtrace")
        || line.contains("backtrace_rs")
        || line.contains("capture_stack")
}

/// Frames between a panic (or a `RawFailure` constructor) and the code that
/// raised it.
fn is_origin_machinery_frame(line: &str) -> bool {
    const MACHINERY: &[&str] = &[
        "std::backtrace",
        "backtrace_rs",
        "std::panicking",
        "core::panicking",
        "std::panic::panic_any",
        "rust_begin_unwind",
        "__rust_end_short_backtrace",
        "std::sys::backtrace",
        "std::sys_common::backtrace",
        "core::ops::function::Fn",
        "failure::panic_hook",
        "failure::raw",
        "core::convert",
        "core::result",
    ];
    MACHINERY.iter().any(|marker| line.contains(marker))
}

fn skip_leading_frames(rendered: &str, skip_frames: usize, is_machinery: fn(&str) -> bool) -> String {
    let mut kept = Vec::new();
    let mut skipping_capture = true;
    let mut skipped = 0usize;
    let mut keeping = false;

    for line in rendered.lines() {
        if is_frame_header(line) {
            if skipping_capture && is_machinery(line) {
                keeping = false;
                continue;
            }
            skipping_capture = false;
            if skipped < skip_frames {
                skipped += 1;
                keeping = false;
                continue;
            }
            keeping = true;
        }
        if keeping {
            kept.push(line);
        }
    }

    kept.join("\n")
}

/// Best-effort text for a value we know nothing about.
fn describe_opaque(value: &(dyn Any + Send)) -> String {
    macro_rules! try_display {
        ($($ty:ty),*) => {
            $(
                if let Some(v) = value.downcast_ref::<$ty>() {
                    return format!("{} ({})", v, stringify!($ty));
                }
            )*
        };
    }
    try_display!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char);
    if let Some(v) = value.downcast_ref::<serde_json::Value>() {
        return v.to_string();
    }
    "<opaque value>".to_string()
}
