use std::path::Path;

use crate::shared::constants::DEFAULT_FORMAT;
use crate::shared::container::OutputContext;
use crate::shared::error::StreamError;
use crate::video::domain::media_backend::MediaBackend;

/// Picks the output container for `filename`.
///
/// The hint is tried first. An absent, empty or unknown hint falls back to
/// [`DEFAULT_FORMAT`] once; if that is unavailable too there is nothing to
/// write with.
pub fn resolve(
    backend: &dyn MediaBackend,
    filename: &Path,
    hint: Option<&str>,
) -> Result<OutputContext, StreamError> {
    let hint = hint.filter(|h| !h.is_empty());
    let format = match hint.and_then(|h| backend.guess_format(h)) {
        Some(format) => format,
        None => {
            log::warn!(
                "Could not deduce output format from {:?}: using {DEFAULT_FORMAT}",
                hint.unwrap_or_default()
            );
            backend.guess_format(DEFAULT_FORMAT).ok_or_else(|| {
                StreamError::Config("could not find suitable output format".to_string())
            })?
        }
    };
    log::debug!("output format {} for {}", format.name, filename.display());
    Ok(OutputContext::new(format, filename))
}
