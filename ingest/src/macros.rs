//! Macros for building and returning [`crate::error::IngestError`] values.

/// Creates an [`crate::error::IngestError`] from an error kind and static description.
///
/// An optional third argument adds dynamic detail (anything implementing [`ToString`], or
/// `detail = <owned String>` to move it), and a trailing `source: <err>` attaches the
/// originating error.
#[macro_export]
macro_rules! ingest_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::IngestError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::IngestError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, detail = $detail:expr) => {
        $crate::error::IngestError::from(($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr, source: $source:expr) => {
        $crate::error::IngestError::from(($kind, $desc, $detail)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::IngestError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::IngestError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Returns early with an [`crate::error::IngestError`] built by [`ingest_error!`].
#[macro_export]
macro_rules! bail {
    ($($args:tt)+) => {
        return ::core::result::Result::Err($crate::ingest_error!($($args)+))
    };
}

/// Returns early with an [`crate::error::IngestError`] when `cond` does not hold.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($args:tt)+) => {
        if !$cond {
            $crate::bail!($($args)+);
        }
    };
}
