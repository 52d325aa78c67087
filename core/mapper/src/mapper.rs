//! Crypto-aware mapper wrapping values into containers and resolving them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::codec::{JsonCodec, ValueCodec};
use crate::config::MapperConfig;
use crate::container::{Container, ContainerState, Terminal};
use crate::metrics::{CryptoMetrics, NopMetrics};
use cryptoshred_common::{Error, Result, SensitiveBytes, SubjectId};
use cryptoshred_crypto::{CryptoAlgorithm, CryptoEngine, CryptoKey, KeySize};
use cryptoshred_storage::KeyRepository;

/// Result of resolving a container without consulting its cache.
#[derive(Debug)]
pub enum ResolveOutcome<T> {
    /// No ciphertext was ever stored.
    Empty,
    /// Decrypted and decoded value.
    Resolved(T),
    /// Key is missing.
    Shredded,
    /// Key lookup, decryption or decoding failed.
    Corrupt(Arc<Error>),
}

impl<T> ResolveOutcome<T> {
    /// Container state this outcome corresponds to.
    pub fn state(&self) -> ContainerState {
        match self {
            Self::Empty => ContainerState::Empty,
            Self::Resolved(_) => ContainerState::Cached,
            Self::Shredded => ContainerState::Shredded,
            Self::Corrupt(_) => ContainerState::Corrupt,
        }
    }

    /// The resolved value, `None` for every other outcome.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Resolved(value) => Some(value),
            _ => None,
        }
    }
}

/// Mapper composing serialization, key lookup and encryption.
///
/// Holds no per-container state; containers are passed in explicitly.
pub struct CryptoMapper<C = JsonCodec> {
    repository: Arc<dyn KeyRepository>,
    metrics: Arc<dyn CryptoMetrics>,
    engine: CryptoEngine,
    codec: C,
    config: MapperConfig,
}

impl CryptoMapper<JsonCodec> {
    /// Start building a mapper over a key repository.
    pub fn builder(repository: Arc<dyn KeyRepository>) -> CryptoMapperBuilder<JsonCodec> {
        CryptoMapperBuilder {
            repository,
            metrics: Arc::new(NopMetrics),
            engine: CryptoEngine::new(),
            codec: JsonCodec,
            config: MapperConfig::default(),
        }
    }

    /// Mapper with JSON encoding, no-op metrics and default configuration.
    pub fn new(repository: Arc<dyn KeyRepository>) -> Self {
        Self::builder(repository).build()
    }
}

impl<C: ValueCodec> CryptoMapper<C> {
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn KeyRepository> {
        &self.repository
    }

    /// Encrypt a value for a subject using the configured defaults.
    ///
    /// # Errors
    /// - Key creation failure in the repository
    /// - Value cannot be serialized
    pub fn wrap<T: Serialize>(&self, value: T, subject_id: &SubjectId) -> Result<Container<T>> {
        self.wrap_with(
            value,
            subject_id,
            self.config.default_algorithm,
            self.config.default_key_size,
        )
    }

    /// Encrypt a value for a subject with an explicit algorithm and key size.
    ///
    /// # Postconditions
    /// - The subject's key for (algorithm, key_size) exists
    /// - The returned container holds the ciphertext and caches `value`
    ///
    /// # Errors
    /// - Key creation failure in the repository
    /// - Value cannot be serialized
    /// - Cipher setup failure
    pub fn wrap_with<T: Serialize>(
        &self,
        value: T,
        subject_id: &SubjectId,
        algorithm: CryptoAlgorithm,
        key_size: KeySize,
    ) -> Result<Container<T>> {
        debug!(subject = %subject_id, algorithm = %algorithm, size = %key_size, "Wrapping value");

        let key = self
            .repository
            .get_or_create_key(subject_id, algorithm, key_size)?;
        let plaintext = SensitiveBytes::new(self.codec.to_bytes(&value)?);
        let encrypted = self.engine.encrypt(plaintext.as_bytes(), algorithm, &key)?;

        Ok(Container::wrapped(
            value,
            subject_id.clone(),
            algorithm,
            key_size,
            encrypted,
        ))
    }

    /// Resolve the plaintext of a container.
    ///
    /// Returns the cached value when present. Otherwise decrypts, caches and
    /// returns the value. Returns `None` when nothing was stored, when the
    /// subject has been shredded, or when the ciphertext cannot be decoded;
    /// these cases are reported to the metrics collaborator, never raised.
    pub fn resolve<'c, T: DeserializeOwned>(&self, container: &'c Container<T>) -> Option<&'c T> {
        if let Some(value) = container.cached() {
            return Some(value);
        }

        self.resolve_outcome(container)
            .into_value()
            .map(|value| container.cache_value(value))
    }

    /// Resolve a container bypassing its plaintext cache.
    ///
    /// Reports the same metrics events as [`resolve`](Self::resolve) but
    /// tells a shredded container apart from a corrupt one.
    ///
    /// Once an instance resolves as `Shredded` or `Corrupt` it keeps that
    /// outcome, and every later call re-emits the matching event without
    /// touching the repository. A key recreated for the subject by a later
    /// `wrap` therefore never turns a shredded field into a corrupt one.
    /// Repository lookup errors are not remembered, since they say nothing
    /// about the container itself.
    pub fn resolve_outcome<T: DeserializeOwned>(&self, container: &Container<T>) -> ResolveOutcome<T> {
        let Some(bytes) = container.encrypted_bytes() else {
            return ResolveOutcome::Empty;
        };

        if let Some(terminal) = container.terminal() {
            return self.terminal_outcome(terminal);
        }

        let subject_id = container.subject_id();
        let key = match self
            .repository
            .find_key(subject_id, container.algorithm(), container.key_size())
        {
            Ok(Some(key)) => key,
            Ok(None) => {
                debug!(subject = %subject_id, "Key missing, treating field as shredded");
                return self.terminal_outcome(container.memoize_terminal(Terminal::Shredded));
            }
            Err(e) => {
                warn!(subject = %subject_id, error = %e, "Key lookup failed");
                self.metrics.notify_decryption_failure(&e);
                return ResolveOutcome::Corrupt(Arc::new(e));
            }
        };

        match self.decrypt_value(&key, container.algorithm(), bytes) {
            Ok(value) => {
                self.metrics.notify_decryption_success();
                ResolveOutcome::Resolved(value)
            }
            Err(e) => {
                warn!(subject = %subject_id, error = %e, "Container could not be resolved");
                let terminal = container.memoize_terminal(Terminal::Corrupt(Arc::new(e)));
                self.terminal_outcome(terminal)
            }
        }
    }

    /// Report a remembered failure and turn it into an outcome.
    fn terminal_outcome<T>(&self, terminal: &Terminal) -> ResolveOutcome<T> {
        match terminal {
            Terminal::Shredded => {
                self.metrics.notify_missing_key();
                ResolveOutcome::Shredded
            }
            Terminal::Corrupt(e) => {
                self.metrics.notify_decryption_failure(e);
                ResolveOutcome::Corrupt(Arc::clone(e))
            }
        }
    }

    fn decrypt_value<T: DeserializeOwned>(
        &self,
        key: &CryptoKey,
        algorithm: CryptoAlgorithm,
        ciphertext: &[u8],
    ) -> Result<T> {
        let plaintext = SensitiveBytes::new(self.engine.decrypt(algorithm, key, ciphertext)?);
        self.codec.from_bytes(plaintext.as_bytes())
    }
}

/// Builder for [`CryptoMapper`].
pub struct CryptoMapperBuilder<C = JsonCodec> {
    repository: Arc<dyn KeyRepository>,
    metrics: Arc<dyn CryptoMetrics>,
    engine: CryptoEngine,
    codec: C,
    config: MapperConfig,
}

impl<C: ValueCodec> CryptoMapperBuilder<C> {
    pub fn metrics(mut self, metrics: Arc<dyn CryptoMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn default_algorithm(mut self, algorithm: CryptoAlgorithm) -> Self {
        self.config.default_algorithm = algorithm;
        self
    }

    pub fn default_key_size(mut self, key_size: KeySize) -> Self {
        self.config.default_key_size = key_size;
        self
    }

    /// Replace the value codec.
    pub fn codec<D: ValueCodec>(self, codec: D) -> CryptoMapperBuilder<D> {
        CryptoMapperBuilder {
            repository: self.repository,
            metrics: self.metrics,
            engine: self.engine,
            codec,
            config: self.config,
        }
    }

    pub fn build(self) -> CryptoMapper<C> {
        debug!(
            repository = self.repository.name(),
            algorithm = %self.config.default_algorithm,
            size = %self.config.default_key_size,
            "Building crypto mapper"
        );

        CryptoMapper {
            repository: self.repository,
            metrics: self.metrics,
            engine: self.engine,
            codec: self.codec,
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{CountingMetrics, MetricsSnapshot};
    use proptest::prelude::*;
    use serde::Deserialize;
    use cryptoshred_storage::{LocalKeyRepository, MemoryKeyRepository};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Address {
        street: String,
        zip: u32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Customer {
        id: u64,
        name: Container<String>,
        address: Container<Address>,
    }

    struct Fixture {
        repo: Arc<MemoryKeyRepository>,
        metrics: Arc<CountingMetrics>,
        mapper: CryptoMapper,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MemoryKeyRepository::new());
        let metrics = Arc::new(CountingMetrics::new());
        let mapper = CryptoMapper::builder(repo.clone())
            .metrics(metrics.clone())
            .build();
        Fixture {
            repo,
            metrics,
            mapper,
        }
    }

    fn subject(id: &str) -> SubjectId {
        SubjectId::new(id).unwrap()
    }

    /// Persist and reload a container, dropping its cache.
    fn reload<T: Serialize + DeserializeOwned>(container: &Container<T>) -> Container<T> {
        let json = serde_json::to_string(container).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_resolve_after_wrap_hits_cache() {
        let f = fixture();
        let container = f.mapper.wrap("Jane Doe".to_string(), &subject("jane")).unwrap();

        assert_eq!(f.mapper.resolve(&container).map(String::as_str), Some("Jane Doe"));
        assert_eq!(f.metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_resolve_after_reload_decrypts() {
        let f = fixture();
        let address = Address {
            street: "Main Street 1".to_string(),
            zip: 12345,
        };
        let container = f.mapper.wrap(address.clone(), &subject("jane")).unwrap();

        let loaded = reload(&container);
        assert_eq!(loaded.state(), ContainerState::Wrapped);
        assert_eq!(f.mapper.resolve(&loaded), Some(&address));
        assert_eq!(loaded.state(), ContainerState::Cached);
        assert_eq!(f.metrics.snapshot().decryption_success, 1);

        // Second resolve is served from the cache.
        assert_eq!(f.mapper.resolve(&loaded), Some(&address));
        assert_eq!(f.metrics.snapshot().decryption_success, 1);
    }

    #[test]
    fn test_wrap_uses_configured_defaults() {
        let repo = Arc::new(MemoryKeyRepository::new());
        let mapper = CryptoMapper::builder(repo.clone())
            .default_key_size(KeySize::Bit128)
            .build();
        let s = subject("jane");

        let container = mapper.wrap(1u8, &s).unwrap();

        assert_eq!(container.algorithm(), CryptoAlgorithm::AesCbc);
        assert_eq!(container.key_size(), KeySize::Bit128);
        assert!(repo
            .find_key(&s, CryptoAlgorithm::AesCbc, KeySize::Bit128)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_wrap_with_overrides_defaults() {
        let f = fixture();
        let s = subject("jane");

        let container = f
            .mapper
            .wrap_with(42i64, &s, CryptoAlgorithm::AesCbc, KeySize::Bit192)
            .unwrap();

        assert_eq!(container.key_size(), KeySize::Bit192);
        assert_eq!(f.mapper.resolve(&reload(&container)), Some(&42));
    }

    #[test]
    fn test_shredded_subject_resolves_to_none() {
        let f = fixture();
        let s = subject("jane");
        let container = f.mapper.wrap("Jane Doe".to_string(), &s).unwrap();
        let loaded = reload(&container);

        f.repo.shred(&s).unwrap();

        assert_eq!(f.mapper.resolve(&loaded), None);
        assert_eq!(f.mapper.resolve(&reload(&container)), None);
        assert!(matches!(
            f.mapper.resolve_outcome(&loaded),
            ResolveOutcome::Shredded
        ));
        assert_eq!(
            f.metrics.snapshot(),
            MetricsSnapshot {
                decryption_success: 0,
                decryption_failure: 0,
                missing_key: 3,
            }
        );

        // The instance that was never reloaded still holds its plaintext.
        assert_eq!(f.mapper.resolve(&container).map(String::as_str), Some("Jane Doe"));
    }

    #[test]
    fn test_truncated_ciphertext_resolves_to_none() {
        let f = fixture();
        let container = f.mapper.wrap("Jane Doe".to_string(), &subject("jane")).unwrap();

        let mut json = serde_json::to_value(&container).unwrap();
        let mut bytes = container.encrypted_bytes().unwrap().to_vec();
        bytes.pop();
        json["encryptedBytes"] = serde_json::Value::String({
            use base64::{engine::general_purpose::STANDARD, Engine as _};
            STANDARD.encode(&bytes)
        });
        let corrupted: Container<String> = serde_json::from_value(json).unwrap();

        assert_eq!(f.mapper.resolve(&corrupted), None);
        assert!(matches!(
            f.mapper.resolve_outcome(&corrupted),
            ResolveOutcome::Corrupt(ref e) if matches!(**e, Error::Decryption(_))
        ));
        assert_eq!(corrupted.state(), ContainerState::Corrupt);
        assert_eq!(f.metrics.snapshot().decryption_failure, 2);
        assert_eq!(f.metrics.snapshot().missing_key, 0);
    }

    #[test]
    fn test_type_mismatch_is_corrupt() {
        let f = fixture();
        let container = f.mapper.wrap("not a number".to_string(), &subject("jane")).unwrap();

        let json = serde_json::to_string(&container).unwrap();
        let mistyped: Container<u64> = serde_json::from_str(&json).unwrap();

        assert_eq!(f.mapper.resolve(&mistyped), None);
        assert!(matches!(
            f.mapper.resolve_outcome(&mistyped),
            ResolveOutcome::Corrupt(ref e) if matches!(**e, Error::Deserialization(_))
        ));
        assert_eq!(mistyped.state(), ContainerState::Corrupt);
    }

    #[test]
    fn test_empty_container_resolves_to_none_silently() {
        let f = fixture();
        let container: Container<String> =
            Container::empty(subject("jane"), CryptoAlgorithm::AesCbc, KeySize::Bit256);

        assert_eq!(f.mapper.resolve(&container), None);
        assert_eq!(f.mapper.resolve_outcome(&container).state(), ContainerState::Empty);
        assert_eq!(f.metrics.snapshot(), MetricsSnapshot::default());
        assert!(f.repo.is_empty().unwrap());
    }

    #[test]
    fn test_rewrap_is_deterministic() {
        let f = fixture();
        let s = subject("jane");

        let first = f.mapper.wrap("Jane Doe".to_string(), &s).unwrap();
        let second = f.mapper.wrap("Jane Doe".to_string(), &s).unwrap();

        assert_eq!(first.encrypted_bytes(), second.encrypted_bytes());
        assert_eq!(f.repo.len().unwrap(), 1);
    }

    #[test]
    fn test_shredding_one_subject_keeps_record_loadable() {
        let f = fixture();
        let jane = subject("jane");
        let john = subject("john");

        let customers = vec![
            Customer {
                id: 1,
                name: f.mapper.wrap("Jane".to_string(), &jane).unwrap(),
                address: f
                    .mapper
                    .wrap(
                        Address {
                            street: "Elm 2".to_string(),
                            zip: 1000,
                        },
                        &jane,
                    )
                    .unwrap(),
            },
            Customer {
                id: 2,
                name: f.mapper.wrap("John".to_string(), &john).unwrap(),
                address: f
                    .mapper
                    .wrap(
                        Address {
                            street: "Oak 3".to_string(),
                            zip: 2000,
                        },
                        &john,
                    )
                    .unwrap(),
            },
        ];
        let stored = serde_json::to_string(&customers).unwrap();

        f.repo.shred(&jane).unwrap();

        let loaded: Vec<Customer> = serde_json::from_str(&stored).unwrap();
        assert_eq!(loaded[0].id, 1);
        assert_eq!(f.mapper.resolve(&loaded[0].name), None);
        assert_eq!(f.mapper.resolve(&loaded[0].address), None);
        assert_eq!(f.mapper.resolve(&loaded[1].name).map(String::as_str), Some("John"));
        assert_eq!(f.mapper.resolve(&loaded[1].address).map(|a| a.zip), Some(2000));
    }

    #[test]
    fn test_recreated_key_does_not_revive_old_data() {
        let f = fixture();
        let s = subject("jane");
        let container = f.mapper.wrap("Jane Doe".to_string(), &s).unwrap();
        let loaded = reload(&container);

        f.repo.shred(&s).unwrap();
        f.mapper.wrap("New Jane".to_string(), &s).unwrap();

        assert_eq!(f.mapper.resolve(&loaded), None);
    }

    #[test]
    fn test_shredded_container_stays_shredded_after_rekey() {
        let f = fixture();
        let s = subject("jane");
        let container = f.mapper.wrap("Jane Doe".to_string(), &s).unwrap();
        let loaded = reload(&container);

        f.repo.shred(&s).unwrap();
        assert_eq!(f.mapper.resolve(&loaded), None);
        assert_eq!(loaded.state(), ContainerState::Shredded);

        // A new write for the subject creates a fresh key.
        f.mapper.wrap("New Jane".to_string(), &s).unwrap();

        assert_eq!(f.mapper.resolve(&loaded), None);
        assert!(matches!(
            f.mapper.resolve_outcome(&loaded),
            ResolveOutcome::Shredded
        ));
        assert_eq!(loaded.state(), ContainerState::Shredded);
        assert_eq!(
            f.metrics.snapshot(),
            MetricsSnapshot {
                decryption_success: 0,
                decryption_failure: 0,
                missing_key: 3,
            }
        );
    }

    #[test]
    fn test_lookup_error_is_not_remembered() {
        let metrics = Arc::new(CountingMetrics::new());
        let broken = CryptoMapper::builder(Arc::new(FailingRepository))
            .metrics(metrics.clone())
            .build();
        let f = fixture();
        let loaded = reload(&f.mapper.wrap("x".to_string(), &subject("jane")).unwrap());

        assert!(matches!(
            broken.resolve_outcome(&loaded),
            ResolveOutcome::Corrupt(ref e) if matches!(**e, Error::KeyRepository(_))
        ));
        assert_eq!(loaded.state(), ContainerState::Wrapped);

        // The same instance resolves once the repository is reachable.
        assert_eq!(f.mapper.resolve(&loaded).map(String::as_str), Some("x"));
    }

    #[test]
    fn test_wrap_propagates_serialization_error() {
        use serde::ser::Error as _;

        struct Unserializable;

        impl Serialize for Unserializable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
                Err(S::Error::custom("refused"))
            }
        }

        let f = fixture();
        let result = f.mapper.wrap(Unserializable, &subject("jane"));
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    struct FailingRepository;

    impl KeyRepository for FailingRepository {
        fn name(&self) -> &str {
            "failing"
        }

        fn get_or_create_key(
            &self,
            _subject_id: &SubjectId,
            _algorithm: CryptoAlgorithm,
            _size: KeySize,
        ) -> Result<Arc<CryptoKey>> {
            Err(Error::KeyRepository("backend offline".to_string()))
        }

        fn find_key(
            &self,
            _subject_id: &SubjectId,
            _algorithm: CryptoAlgorithm,
            _size: KeySize,
        ) -> Result<Option<Arc<CryptoKey>>> {
            Err(Error::KeyRepository("backend offline".to_string()))
        }
    }

    #[test]
    fn test_repository_failure_is_loud_on_write_soft_on_read() {
        let metrics = Arc::new(CountingMetrics::new());
        let mapper = CryptoMapper::builder(Arc::new(FailingRepository))
            .metrics(metrics.clone())
            .build();
        let s = subject("jane");

        assert!(matches!(
            mapper.wrap("x".to_string(), &s),
            Err(Error::KeyRepository(_))
        ));

        // Produce a container with a working mapper, then read it through the broken one.
        let container = fixture().mapper.wrap("x".to_string(), &s).unwrap();
        let loaded = reload(&container);
        assert_eq!(mapper.resolve(&loaded), None);
        assert_eq!(metrics.snapshot().decryption_failure, 1);
    }

    #[test]
    fn test_local_repository_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let s = subject("jane");

        let stored = {
            let repo = Arc::new(LocalKeyRepository::new(temp_dir.path()).unwrap());
            let mapper = CryptoMapper::new(repo);
            serde_json::to_string(&mapper.wrap("Jane Doe".to_string(), &s).unwrap()).unwrap()
        };

        let repo = Arc::new(LocalKeyRepository::new(temp_dir.path()).unwrap());
        let mapper = CryptoMapper::new(repo.clone());
        let loaded: Container<String> = serde_json::from_str(&stored).unwrap();
        assert_eq!(mapper.resolve(&loaded).map(String::as_str), Some("Jane Doe"));

        repo.shred(&s).unwrap();
        let reloaded: Container<String> = serde_json::from_str(&stored).unwrap();
        assert_eq!(mapper.resolve(&reloaded), None);
    }

    proptest! {
        #[test]
        fn prop_wrap_reload_resolve_roundtrip(
            street in ".*",
            zip in any::<u32>(),
            subject_id in "[^\\x00]{1,32}",
            size in prop_oneof![Just(KeySize::Bit128), Just(KeySize::Bit192), Just(KeySize::Bit256)],
        ) {
            let f = fixture();
            let address = Address { street, zip };
            let s = SubjectId::new(subject_id).unwrap();

            let container = f
                .mapper
                .wrap_with(address.clone(), &s, CryptoAlgorithm::AesCbc, size)
                .unwrap();
            prop_assert_eq!(f.mapper.resolve(&container), Some(&address));

            let loaded = reload(&container);
            prop_assert_eq!(f.mapper.resolve(&loaded), Some(&address));
        }
    }
}
