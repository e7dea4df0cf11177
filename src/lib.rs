//! Streaming document generation with incremental patch application and a
//! local result cache.

mod config;

pub use crate::config::{CacheSection, Config, GeneratorSection, StreamSection};

use anyhow::Context;
use cache::{CacheKey, CacheStorage, FileStorage, GenerationCache, derive_key};
use core_types::{GenerationRequest, GenerationResult, RequestKind};
use net::{CancelFlag, StreamOpener};
use stream::{GenerationRun, Phase, StreamConsumer};

/// How a [`Generator::generate`] call was satisfied.
#[derive(Debug)]
pub struct Outcome {
    pub result: GenerationResult,
    pub from_cache: bool,
}

/// Cache-fronted generation over any transport.
pub struct Generator<O, S = FileStorage> {
    consumer: StreamConsumer<O>,
    cache: Option<GenerationCache<S>>,
}

impl<O: StreamOpener> Generator<O, FileStorage> {
    pub fn from_config(opener: O, config: &Config) -> anyhow::Result<Self> {
        let cache = if config.cache.enabled {
            let mut storage = FileStorage::open(&config.cache.dir).with_context(|| {
                format!("failed to open cache directory {}", config.cache.dir.display())
            })?;
            if let Some(quota) = config.cache.quota_bytes {
                storage = storage.with_quota(quota);
            }
            Some(GenerationCache::new(storage, config.cache()))
        } else {
            None
        };
        Ok(Self {
            consumer: StreamConsumer::new(opener, config.consumer()),
            cache,
        })
    }
}

impl<O: StreamOpener, S: CacheStorage> Generator<O, S> {
    pub fn new(consumer: StreamConsumer<O>, cache: Option<GenerationCache<S>>) -> Self {
        Self { consumer, cache }
    }

    /// Serve a fresh generation from the cache or stream it from the
    /// generator. Refinements always stream and are never cached.
    pub fn generate(
        &mut self,
        request: &GenerationRequest,
        cancel: &CancelFlag,
        on_update: impl FnMut(Phase, &str),
    ) -> anyhow::Result<Outcome> {
        let key = self.cacheable_key(request);
        if let (Some(cache), Some(key)) = (self.cache.as_mut(), key.as_ref()) {
            if let Some(entry) = cache.get(key) {
                log::info!("serving {key} from cache");
                return Ok(Outcome {
                    result: entry.into_result(),
                    from_cache: true,
                });
            }
        }

        let mut run = GenerationRun::for_request(request);
        let result = run
            .drive(&mut self.consumer, request, cancel, on_update)
            .context("generation failed")?;

        if let (Some(cache), Some(key)) = (self.cache.as_mut(), key.as_ref()) {
            cache.set(key, &result);
        }
        Ok(Outcome {
            result,
            from_cache: false,
        })
    }

    /// Drop the cached result of the generation a refinement started from.
    pub fn invalidate_origin(&mut self, origin: &GenerationRequest) {
        if let Some(cache) = self.cache.as_mut() {
            let key = derive_key(&origin.prompt, &origin.selections, &origin.options);
            log::debug!("invalidating {key} after refinement");
            cache.invalidate(&key);
        }
    }

    pub fn cache(&self) -> Option<&GenerationCache<S>> {
        self.cache.as_ref()
    }

    fn cacheable_key(&self, request: &GenerationRequest) -> Option<CacheKey> {
        match request.kind {
            RequestKind::Generate => Some(cache::derive_key_for(request)),
            RequestKind::Refine => None,
        }
    }
}
