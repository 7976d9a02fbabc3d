//! Validated settings mutations
//!
//! Every operation loads the aggregate, changes it and saves it whole.
//! Input is validated before anything is written, so a rejected edit never
//! reaches the store or the reconciler.

use std::future::Future;

use sb_core::schedule::format_clock_time;
use sb_core::site::SitePattern;
use sb_core::types::{FocusMode, Schedule, Settings, SiteEntry};

use crate::error::EditError;
use crate::store::SettingsStore;

/// Longest focus session, in minutes.
pub const MAX_FOCUS_MINUTES: u32 = 24 * 60;

/// Result of an edit: the aggregate after the operation and whether it was
/// saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub settings: Settings,
    pub changed: bool,
}

pub struct SettingsEditor<S> {
    store: S,
}

impl<S: SettingsStore> SettingsEditor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn settings(&self) -> Result<Settings, EditError> {
        Ok(self.store.load().await?)
    }

    /// Load, apply `change`, and save if it reports a modification.
    async fn update<F>(&self, change: F) -> Result<Edit, EditError>
    where
        F: FnOnce(&mut Settings) -> Result<bool, EditError> + Send,
    {
        let mut settings = self.store.load().await?;
        let changed = change(&mut settings)?;
        if changed {
            self.store.save(&settings).await?;
        }
        Ok(Edit { settings, changed })
    }

    /// Add a site unless an entry with the same normalised pattern exists.
    pub async fn add_site(&self, url: &str, category: Option<&str>) -> Result<Edit, EditError> {
        let pattern = SitePattern::parse(url)?;
        let entry = SiteEntry {
            url: pattern.as_str().to_string(),
            category: category.map(str::to_string),
        };

        self.update(move |settings| {
            let exists = settings
                .sites
                .iter()
                .any(|site| SitePattern::parse(&site.url).as_ref() == Ok(&pattern));
            if exists {
                log::info!("'{pattern}' is already blocked");
                return Ok(false);
            }
            settings.sites.push(entry);
            Ok(true)
        })
        .await
    }

    /// Remove every entry matching `url`, either by normalised pattern or
    /// by its raw stored text.
    pub async fn remove_site(&self, url: &str) -> Result<Edit, EditError> {
        let raw = url.trim().to_string();
        let pattern = SitePattern::parse(url).ok();

        self.update(move |settings| {
            let before = settings.sites.len();
            settings.sites.retain(|site| {
                let same_text = site.url.trim() == raw;
                let same_pattern = pattern.is_some() && SitePattern::parse(&site.url).ok() == pattern;
                !(same_text || same_pattern)
            });
            if settings.sites.len() == before {
                log::info!("'{raw}' is not in the block list");
            }
            Ok(settings.sites.len() != before)
        })
        .await
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<Edit, EditError> {
        self.update(move |settings| {
            let changed = settings.is_blocking_enabled != enabled;
            settings.is_blocking_enabled = enabled;
            Ok(changed)
        })
        .await
    }

    pub async fn toggle(&self) -> Result<Edit, EditError> {
        self.update(|settings| {
            settings.is_blocking_enabled = !settings.is_blocking_enabled;
            Ok(true)
        })
        .await
    }

    /// Store a validated schedule with normalised times and sorted days.
    pub async fn set_schedule(&self, schedule: Schedule) -> Result<Edit, EditError> {
        let window = schedule.validate()?;
        let normalised = Schedule {
            start_time: format_clock_time(window.start),
            end_time: format_clock_time(window.end),
            days: window.days.to_days(),
        };

        self.update(move |settings| {
            let changed = settings.schedule.as_ref() != Some(&normalised);
            settings.schedule = Some(normalised);
            Ok(changed)
        })
        .await
    }

    pub async fn clear_schedule(&self) -> Result<Edit, EditError> {
        self.update(|settings| Ok(settings.schedule.take().is_some())).await
    }

    /// Start a focus session of `minutes` from `now_ms` (epoch millis).
    ///
    /// The stored blocking flag is left alone; the session forces blocking
    /// on only while it runs.
    pub async fn start_focus(&self, minutes: u32, now_ms: i64) -> Result<Edit, EditError> {
        if minutes == 0 || minutes > MAX_FOCUS_MINUTES {
            return Err(EditError::InvalidDuration {
                minutes,
                max: MAX_FOCUS_MINUTES,
            });
        }

        self.update(move |settings| {
            settings.focus_mode = FocusMode {
                is_active: true,
                end_time: Some(now_ms + i64::from(minutes) * 60_000),
                duration: Some(minutes),
            };
            Ok(true)
        })
        .await
    }

    pub async fn stop_focus(&self) -> Result<Edit, EditError> {
        self.update(|settings| {
            if !settings.focus_mode.is_active {
                return Ok(false);
            }
            settings.focus_mode.is_active = false;
            settings.focus_mode.end_time = None;
            Ok(true)
        })
        .await
    }
}

/// Run `op`, re-attempting it up to `retries` more times while it fails
/// with a retryable (storage) error.
pub async fn with_retries<T, F, Fut>(retries: u32, mut op: F) -> Result<T, EditError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EditError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < retries => {
                attempt += 1;
                log::warn!("{err}; retrying ({attempt}/{retries})");
            }
            result => return result,
        }
    }
}
