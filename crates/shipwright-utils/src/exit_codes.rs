//! Exit code constants for the shipwright CLI.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Run reached DONE |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `INVALID_INPUT` | Initial request rejected before any phase ran |
//! | 4 | `REQUIREMENTS_INCOMPLETE` | Dialog hit the turn limit |
//! | 5 | `GENERATION_FAILED` | Generation failed after its retry |
//! | 6 | `VALIDATION_EXHAUSTED` | Tests still failing at the attempt limit |
//! | 7 | `SANDBOX_FAILURE` | Test suite could not be executed |
//! | 8 | `PACKAGING_FAILED` | Deliverable could not be written |
//! | 130 | `CANCELLED` | Run cancelled (Ctrl-C) |

/// Process exit code.
///
/// The numeric values are part of the CLI contract; scripts branch on them.
///
/// ```rust
/// use shipwright_utils::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::from_i32(7), ExitCode::SANDBOX_FAILURE);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Run reached DONE and the deliverable was written
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments or configuration file invalid
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Initial request was empty or otherwise unusable
    pub const INVALID_INPUT: ExitCode = ExitCode(3);

    /// Requirements dialog exceeded its turn limit
    pub const REQUIREMENTS_INCOMPLETE: ExitCode = ExitCode(4);

    /// Generation collaborator produced unusable output twice in a row
    pub const GENERATION_FAILED: ExitCode = ExitCode(5);

    /// Every permitted attempt was rejected by the test suite
    pub const VALIDATION_EXHAUSTED: ExitCode = ExitCode(6);

    /// The sandbox could not run the test suite
    pub const SANDBOX_FAILURE: ExitCode = ExitCode(7);

    /// Packaging the accepted project failed
    pub const PACKAGING_FAILED: ExitCode = ExitCode(8);

    /// Run was cancelled from outside
    pub const CANCELLED: ExitCode = ExitCode(130);

    /// Get the numeric exit code value for `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
