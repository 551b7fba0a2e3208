//! Configuração do verdict carregada a partir de `verdict.toml`.
//!
//! A struct [`VerdictConfig`] contém todos os parâmetros do escalonador.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `VERDICT_MODEL_PATH` tem precedência sobre o
//! arquivo para a localização do modelo.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, VerdictError};

pub const DEFAULT_CONFIG_FILE: &str = "verdict.toml";
pub const MODEL_PATH_ENV: &str = "VERDICT_MODEL_PATH";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerdictConfig {
    /// Número de workers concorrentes no pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacidade da fila. `None` significa sem limite.
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    /// Tamanho máximo do texto aceito, em bytes.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Timeout de classificação por job, em milissegundos.
    #[serde(default)]
    pub job_timeout_ms: Option<u64>,

    /// Jobs em execução há mais tempo que isto são marcados como falhos pelo
    /// watchdog. `None` desativa o watchdog.
    #[serde(default)]
    pub stall_timeout_ms: Option<u64>,

    /// Intervalo entre as verificações do watchdog.
    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,

    /// Mantém no máximo este número de jobs finalizados. `None` mantém todos.
    #[serde(default)]
    pub retain_finished: Option<usize>,

    /// Arquivo do modelo treinado. `None` usa o classificador por palavras-chave.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
}

fn default_workers() -> usize {
    4
}

fn default_max_payload_bytes() -> usize {
    10_000
}

fn default_watchdog_interval_ms() -> u64 {
    1000
}

impl Default for VerdictConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: None,
            max_payload_bytes: default_max_payload_bytes(),
            job_timeout_ms: None,
            stall_timeout_ms: None,
            watchdog_interval_ms: default_watchdog_interval_ms(),
            retain_finished: None,
            model_path: None,
        }
    }
}

impl VerdictConfig {
    /// Carrega `verdict.toml` do diretório atual, usando os defaults quando
    /// o arquivo não existe.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Carrega o arquivo indicado; arquivo ausente resulta nos defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<VerdictConfig>(&contents)?
        } else {
            Self::default()
        };

        match std::env::var(MODEL_PATH_ENV) {
            Ok(model) if !model.is_empty() => config.model_path = Some(PathBuf::from(model)),
            _ => {}
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(VerdictError::Config("workers must be at least 1".into()));
        }
        if self.queue_capacity == Some(0) {
            return Err(VerdictError::Config(
                "queue_capacity must be at least 1 when set".into(),
            ));
        }
        if self.max_payload_bytes == 0 {
            return Err(VerdictError::Config(
                "max_payload_bytes must be at least 1".into(),
            ));
        }
        if self.watchdog_interval_ms == 0 {
            return Err(VerdictError::Config(
                "watchdog_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_ms.map(Duration::from_millis)
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_ms.map(Duration::from_millis)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = VerdictConfig::default();
        assert_eq!(config.workers, 4);
        assert!(config.queue_capacity.is_none());
        assert_eq!(config.max_payload_bytes, 10_000);
        assert!(config.job_timeout_ms.is_none());
        assert!(config.stall_timeout_ms.is_none());
        assert_eq!(config.watchdog_interval_ms, 1000);
        assert!(config.retain_finished.is_none());
        assert!(config.model_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            workers = 2
            queue_capacity = 16
            job_timeout_ms = 500
        "#;
        let config: VerdictConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_capacity, Some(16));
        assert_eq!(config.job_timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.max_payload_bytes, 10_000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = toml::from_str::<VerdictConfig>("wrokers = 3");
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let config = VerdictConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VerdictError::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let config = VerdictConfig {
            queue_capacity: Some(0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VerdictError::Config(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = 8\nstall_timeout_ms = 2000").unwrap();
        let config = VerdictConfig::load_from(file.path()).unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.stall_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn load_from_invalid_file_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = 0").unwrap();
        assert!(VerdictConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let config = VerdictConfig::load_from(Path::new("/no/such/verdict.toml")).unwrap();
        assert_eq!(config.workers, 4);
    }
}
