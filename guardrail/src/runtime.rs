//! Runtime wiring helpers for the full turn pipeline.

use std::sync::Arc;

use gchat::{ChatError, TurnHooks, TurnService};
use gobserve::{SafeProviderHooks, SafeTurnHooks, TracingObservabilityHooks};
use gpolicy::{InMemoryRuleSource, RuleSource};
use gprovider::{ProviderOperationHooks, ProviderSelector};
use gsession::{SessionStore, create_session_store};

use crate::{GuardrailConfig, providers::build_providers};

/// Everything a fully wired deployment holds onto.
///
/// `rules` is the live rule source: guardian rule changes made through it
/// take effect on the next turn without rebuilding anything.
#[derive(Clone)]
pub struct RuntimeBundle {
    pub store: Arc<dyn SessionStore>,
    pub rules: Arc<InMemoryRuleSource>,
    pub selector: Arc<ProviderSelector>,
    pub turns: Arc<TurnService>,
}

/// Builds adapters, selector, store, rules, and turn service from one
/// config, with no observability hooks attached.
pub fn build_runtime(config: GuardrailConfig) -> Result<RuntimeBundle, ChatError> {
    build_runtime_with_hooks(config, None, None)
}

/// `build_runtime` with tracing hooks on both the provider and turn
/// phases, each wrapped so a panicking subscriber cannot take down a turn.
pub fn build_observed_runtime(config: GuardrailConfig) -> Result<RuntimeBundle, ChatError> {
    build_runtime_with_hooks(
        config,
        Some(Arc::new(SafeProviderHooks::new(TracingObservabilityHooks))),
        Some(Arc::new(SafeTurnHooks::new(TracingObservabilityHooks))),
    )
}

pub fn build_runtime_with_hooks(
    config: GuardrailConfig,
    provider_hooks: Option<Arc<dyn ProviderOperationHooks>>,
    turn_hooks: Option<Arc<dyn TurnHooks>>,
) -> Result<RuntimeBundle, ChatError> {
    let providers = build_providers(&config)?;

    let mut selector = ProviderSelector::new(providers, config.selection);
    if let Some(hooks) = provider_hooks {
        selector = selector.with_hooks(hooks);
    }
    let selector = Arc::new(selector);

    let store = create_session_store(config.store)?;
    let rules = Arc::new(InMemoryRuleSource::new(config.default_rules));

    let mut turns = TurnService::new(
        Arc::clone(&selector),
        Arc::clone(&store),
        Arc::clone(&rules) as Arc<dyn RuleSource>,
    );
    if let Some(hooks) = turn_hooks {
        turns = turns.with_hooks(hooks);
    }

    Ok(RuntimeBundle {
        store,
        rules,
        selector,
        turns: Arc::new(turns),
    })
}
