use crate::{
    error::{Error, Result},
    output::SelectionResult,
    select::{Quality, select_variant},
    twitch::structs::{AccessToken, Variant},
};

/// State of a single resolution, owned by the call that created it
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub channel: String,
    pub quality: Quality,
    pub token: Option<AccessToken>,
    /// `None` until the master playlist has been fetched
    pub variants: Option<Vec<Variant>>,
    /// Every failure met along the way, oldest first
    pub errors: Vec<Error>,
}

impl Session {
    #[must_use]
    pub fn new(channel: impl Into<String>, quality: Quality) -> Self {
        Self {
            channel: channel.into(),
            quality,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        self.variants.as_deref().unwrap_or_default()
    }

    /// Selects using the session's own quality
    ///
    /// # Errors
    /// See [`select_variant`]
    pub fn select(&self) -> Result<SelectionResult> {
        self.select_with(&self.quality)
    }

    /// Selects with an explicit quality, leaving the session untouched
    ///
    /// # Errors
    /// See [`select_variant`]
    pub fn select_with(&self, quality: &Quality) -> Result<SelectionResult> {
        let variant = select_variant(self.variants(), quality)?;
        Ok(SelectionResult::new(&self.channel, quality, variant))
    }

    /// Keeps a copy of the failure on the session and hands it back
    pub(crate) fn record(&mut self, err: Error) -> Error {
        self.errors.push(err.clone());
        err
    }
}
