//! 弹性模块：退避策略。
//!
//! # Resilience
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`backoff`] | Delay between dispatcher attempts, and when to give up |
//!
//! ```rust
//! use genai_lib_rust::resilience::{Backoff, ExponentialBackoff};
//! use std::time::Duration;
//!
//! let policy = ExponentialBackoff::default()
//!     .with_initial(Duration::from_millis(50))
//!     .with_max_attempts(4);
//! assert_eq!(policy.pause(2), Some(Duration::from_millis(100)));
//! assert_eq!(policy.pause(4), None);
//! ```

pub mod backoff;

pub use backoff::{Backoff, ExponentialBackoff, NoPauseBackoff, PauseOneSecond};
