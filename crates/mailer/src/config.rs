//! Shared delivery settings.
//!
//! Every dispatch, enqueue and perform re-reads the settings at call time, so a
//! change is visible to the next call. Settings are swapped as a whole
//! snapshot: a reader never sees a new queue name paired with an old queue
//! target.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use courier_core::{Environment, ErrorKind, RetryPolicy, TargetType};

use crate::queue::QueueBackend;

/// Queue name used unless overridden.
pub const DEFAULT_QUEUE_NAME: &str = "mailer";

/// Environments in which deliveries bypass the queue unless overridden.
pub const DEFAULT_EXCLUDED_ENVIRONMENTS: &[&str] = &["test"];

const DEFAULT_ENVIRONMENT: &str = "development";

const ENV_CURRENT: &str = "COURIER_ENV";
const ENV_QUEUE: &str = "COURIER_QUEUE";
const ENV_EXCLUDED: &str = "COURIER_EXCLUDED_ENVS";
const ENV_PERFORM_DELIVERIES: &str = "COURIER_PERFORM_DELIVERIES";

/// One immutable snapshot of the delivery settings.
#[derive(Clone)]
pub struct Settings {
    queue_target: Arc<dyn QueueBackend>,
    queue_name: String,
    excluded_environments: BTreeSet<Environment>,
    perform_deliveries: bool,
    current_environment: Environment,
    retry_policies: HashMap<TargetType, RetryPolicy>,
}

impl Settings {
    /// Defaults around the given queue target.
    pub fn new(queue_target: Arc<dyn QueueBackend>) -> Self {
        Self {
            queue_target,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            excluded_environments: DEFAULT_EXCLUDED_ENVIRONMENTS
                .iter()
                .map(|e| Environment::new(e))
                .collect(),
            perform_deliveries: true,
            current_environment: Environment::new(DEFAULT_ENVIRONMENT),
            retry_policies: HashMap::new(),
        }
    }

    pub fn queue_target(&self) -> &Arc<dyn QueueBackend> {
        &self.queue_target
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn excluded_environments(&self) -> &BTreeSet<Environment> {
        &self.excluded_environments
    }

    pub fn perform_deliveries(&self) -> bool {
        self.perform_deliveries
    }

    pub fn current_environment(&self) -> &Environment {
        &self.current_environment
    }

    pub fn is_excluded_environment(&self, env: &Environment) -> bool {
        self.excluded_environments.contains(env)
    }

    /// Whether dispatch must bypass the queue right now.
    pub fn deliveries_excluded(&self) -> bool {
        !self.perform_deliveries || self.is_excluded_environment(&self.current_environment)
    }

    /// Retryable set for `target` (base set only when nothing was declared).
    pub fn retry_policy(&self, target: &TargetType) -> RetryPolicy {
        self.retry_policies.get(target).cloned().unwrap_or_default()
    }

    pub fn set_queue_target(&mut self, queue_target: Arc<dyn QueueBackend>) {
        self.queue_target = queue_target;
    }

    pub fn set_queue_name(&mut self, queue_name: impl Into<String>) {
        self.queue_name = queue_name.into();
    }

    pub fn set_excluded_environments<I, E>(&mut self, environments: I)
    where
        I: IntoIterator<Item = E>,
        E: Into<Environment>,
    {
        self.excluded_environments = environments.into_iter().map(Into::into).collect();
    }

    pub fn set_perform_deliveries(&mut self, enabled: bool) {
        self.perform_deliveries = enabled;
    }

    pub fn set_current_environment(&mut self, env: impl Into<Environment>) {
        self.current_environment = env.into();
    }

    /// Declare the extra categories `target` retries. Replaces any earlier
    /// declaration for the same target.
    pub fn set_additional_errors_to_retry(
        &mut self,
        target: TargetType,
        kinds: impl IntoIterator<Item = ErrorKind>,
    ) {
        self.retry_policies
            .insert(target, RetryPolicy::with_additional(kinds));
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("queue_name", &self.queue_name)
            .field("excluded_environments", &self.excluded_environments)
            .field("perform_deliveries", &self.perform_deliveries)
            .field("current_environment", &self.current_environment)
            .field("retry_policies", &self.retry_policies)
            .finish_non_exhaustive()
    }
}

/// Shared handle to the delivery settings.
///
/// Cloning is cheap; every clone observes the same settings. Dispatchers,
/// deferred handles and the retry engine all hold one.
#[derive(Clone)]
pub struct MailerConfig {
    inner: Arc<RwLock<Arc<Settings>>>,
}

impl MailerConfig {
    pub fn new(queue_target: Arc<dyn QueueBackend>) -> Self {
        Self::from_settings(Settings::new(queue_target))
    }

    pub fn from_settings(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(settings))),
        }
    }

    /// Build the settings from `COURIER_*` environment variables.
    pub fn from_env(queue_target: Arc<dyn QueueBackend>) -> Self {
        Self::from_lookup(queue_target, |key| std::env::var(key).ok())
    }

    /// Like [`MailerConfig::from_env`], reading variables through `lookup`.
    ///
    /// Unparsable values are logged and the default is kept.
    pub fn from_lookup<F>(queue_target: Arc<dyn QueueBackend>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::new(queue_target);

        if let Some(env) = lookup(ENV_CURRENT).filter(|v| !v.trim().is_empty()) {
            settings.set_current_environment(env);
        }

        if let Some(queue) = lookup(ENV_QUEUE).map(|v| v.trim().to_string()) {
            if queue.is_empty() {
                warn!(var = ENV_QUEUE, "empty queue name; using default");
            } else {
                settings.set_queue_name(queue);
            }
        }

        if let Some(list) = lookup(ENV_EXCLUDED) {
            settings.set_excluded_environments(
                list.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(Environment::new),
            );
        }

        if let Some(raw) = lookup(ENV_PERFORM_DELIVERIES) {
            match parse_flag(&raw) {
                Some(enabled) => settings.set_perform_deliveries(enabled),
                None => warn!(
                    var = ENV_PERFORM_DELIVERIES,
                    value = %raw,
                    "unrecognized boolean; deliveries stay enabled"
                ),
            }
        }

        debug!(settings = ?settings, "mailer settings loaded");
        Self::from_settings(settings)
    }

    /// Current settings. The snapshot stays consistent even if the settings
    /// are changed while it is held.
    pub fn snapshot(&self) -> Arc<Settings> {
        self.read().clone()
    }

    pub fn queue_name(&self) -> String {
        self.read().queue_name().to_string()
    }

    pub fn queue_target(&self) -> Arc<dyn QueueBackend> {
        self.read().queue_target().clone()
    }

    pub fn deliveries_excluded(&self) -> bool {
        self.read().deliveries_excluded()
    }

    pub fn retry_policy(&self, target: &TargetType) -> RetryPolicy {
        self.read().retry_policy(target)
    }

    /// Apply `f` to a copy of the settings and publish the result.
    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        let mut guard = self.write();
        let mut next = Settings::clone(&guard);
        f(&mut next);
        *guard = Arc::new(next);
    }

    pub fn set_queue_target(&self, queue_target: Arc<dyn QueueBackend>) {
        self.update(|s| s.set_queue_target(queue_target));
    }

    pub fn set_queue_name(&self, queue_name: impl Into<String>) {
        self.update(|s| s.set_queue_name(queue_name));
    }

    pub fn set_excluded_environments<I, E>(&self, environments: I)
    where
        I: IntoIterator<Item = E>,
        E: Into<Environment>,
    {
        self.update(|s| s.set_excluded_environments(environments));
    }

    pub fn set_perform_deliveries(&self, enabled: bool) {
        self.update(|s| s.set_perform_deliveries(enabled));
    }

    pub fn set_current_environment(&self, env: impl Into<Environment>) {
        self.update(|s| s.set_current_environment(env));
    }

    /// Declare the extra categories `target` retries (replace semantics).
    pub fn additional_errors_to_retry(
        &self,
        target: impl Into<TargetType>,
        kinds: impl IntoIterator<Item = ErrorKind>,
    ) {
        let target = target.into();
        self.update(|s| s.set_additional_errors_to_retry(target, kinds));
    }

    /// Restore the defaults, keeping the current queue target.
    pub fn reset(&self) {
        self.update(|s| *s = Settings::new(s.queue_target.clone()));
    }

    /// Change settings until the returned guard is dropped.
    pub fn override_with(&self, f: impl FnOnce(&mut Settings)) -> ConfigOverride {
        let previous = self.snapshot();
        self.update(f);
        ConfigOverride {
            config: self.clone(),
            previous: Some(previous),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Arc<Settings>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<Settings>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for MailerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MailerConfig").field(&*self.read()).finish()
    }
}

/// Restores the settings captured by [`MailerConfig::override_with`] on drop.
#[must_use = "the override is reverted as soon as the guard is dropped"]
pub struct ConfigOverride {
    config: MailerConfig,
    previous: Option<Arc<Settings>>,
}

impl Drop for ConfigOverride {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.config.write() = previous;
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingQueue;

    fn config() -> (Arc<RecordingQueue>, MailerConfig) {
        let queue = Arc::new(RecordingQueue::default());
        let config = MailerConfig::new(queue.clone());
        (queue, config)
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let (_, config) = config();
        let settings = config.snapshot();

        assert_eq!(settings.queue_name(), "mailer");
        assert!(settings.is_excluded_environment(&Environment::test()));
        assert!(settings.perform_deliveries());
        assert_eq!(settings.current_environment(), &Environment::development());
        assert!(!settings.deliveries_excluded());
    }

    #[test]
    fn queue_name_can_be_overridden() {
        let (_, config) = config();
        config.set_queue_name("postal");
        assert_eq!(config.queue_name(), "postal");
    }

    #[test]
    fn queue_target_can_be_swapped_at_runtime() {
        let (first, config) = config();
        let second = Arc::new(RecordingQueue::default());
        config.set_queue_target(second.clone());

        let target = config.queue_target();
        target
            .enqueue(
                "mailer",
                courier_core::Attempt::FIRST,
                &courier_core::ActionRequest::new("A".into(), "b".into(), vec![]),
            )
            .unwrap();

        assert!(first.calls().is_empty());
        assert_eq!(second.calls().len(), 1);
    }

    #[test]
    fn excluded_environments_are_normalized() {
        let (_, config) = config();
        config.set_excluded_environments(["Custom", " STAGING "]);
        config.set_current_environment("staging");

        let settings = config.snapshot();
        assert!(settings.is_excluded_environment(&Environment::new("custom")));
        assert!(!settings.is_excluded_environment(&Environment::test()));
        assert!(settings.deliveries_excluded());
    }

    #[test]
    fn disabled_deliveries_exclude_every_environment() {
        let (_, config) = config();
        config.set_perform_deliveries(false);
        assert!(config.deliveries_excluded());
    }

    #[test]
    fn redeclaring_additional_errors_replaces_the_set() {
        let (_, config) = config();
        config.additional_errors_to_retry("WelcomeMailer", [ErrorKind::custom("a")]);
        config.additional_errors_to_retry("WelcomeMailer", [ErrorKind::custom("b")]);

        let policy = config.retry_policy(&TargetType::new("WelcomeMailer"));
        assert_eq!(policy.additional(), &[ErrorKind::custom("b")]);
        assert!(
            config
                .retry_policy(&TargetType::new("Other"))
                .additional()
                .is_empty()
        );
    }

    #[test]
    fn snapshots_are_not_affected_by_later_updates() {
        let (_, config) = config();
        let before = config.snapshot();
        config.set_queue_name("postal");

        assert_eq!(before.queue_name(), "mailer");
        assert_eq!(config.snapshot().queue_name(), "postal");
    }

    #[test]
    fn override_guard_restores_previous_settings() {
        let (_, config) = config();
        {
            let _guard = config.override_with(|s| {
                s.set_queue_name("postal");
                s.set_current_environment("test");
            });
            assert_eq!(config.queue_name(), "postal");
            assert!(config.deliveries_excluded());
        }
        assert_eq!(config.queue_name(), "mailer");
        assert!(!config.deliveries_excluded());
    }

    #[test]
    fn reset_restores_defaults_but_keeps_the_target() {
        let (queue, config) = config();
        config.set_queue_name("postal");
        config.set_perform_deliveries(false);
        config.reset();

        assert_eq!(config.queue_name(), "mailer");
        assert!(!config.deliveries_excluded());
        config
            .queue_target()
            .enqueue(
                "mailer",
                courier_core::Attempt::FIRST,
                &courier_core::ActionRequest::new("A".into(), "b".into(), vec![]),
            )
            .unwrap();
        assert_eq!(queue.calls().len(), 1);
    }

    #[test]
    fn lookup_reads_courier_variables() {
        let queue: Arc<dyn QueueBackend> = Arc::new(RecordingQueue::default());
        let vars: HashMap<&str, &str> = HashMap::from([
            ("COURIER_ENV", "Production"),
            ("COURIER_QUEUE", "postal"),
            ("COURIER_EXCLUDED_ENVS", "test, ci,"),
            ("COURIER_PERFORM_DELIVERIES", "no"),
        ]);
        let config = MailerConfig::from_lookup(queue, |k| vars.get(k).map(|v| v.to_string()));
        let settings = config.snapshot();

        assert_eq!(settings.current_environment().as_str(), "production");
        assert_eq!(settings.queue_name(), "postal");
        assert_eq!(settings.excluded_environments().len(), 2);
        assert!(settings.is_excluded_environment(&Environment::new("ci")));
        assert!(!settings.perform_deliveries());
    }

    #[test]
    fn lookup_keeps_defaults_for_bad_values() {
        let queue: Arc<dyn QueueBackend> = Arc::new(RecordingQueue::default());
        let config = MailerConfig::from_lookup(queue, |k| match k {
            "COURIER_PERFORM_DELIVERIES" => Some("maybe".to_string()),
            "COURIER_QUEUE" => Some("   ".to_string()),
            _ => None,
        });
        let settings = config.snapshot();

        assert!(settings.perform_deliveries());
        assert_eq!(settings.queue_name(), "mailer");
    }
}
