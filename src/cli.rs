//! Interface de linha de comando do verdict baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (classify, batch, demo)
//! e flags globais que sobrescrevem os valores de `verdict.toml`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use verdict::VerdictConfig;

/// verdict: enfileira textos para classificação real/fake e acompanha os jobs.
#[derive(Debug, Parser)]
#[command(name = "verdict", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Arquivo de configuração (padrão: ./verdict.toml, se existir).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Número de workers concorrentes.
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Limita a fila a este número de jobs pendentes.
    #[arg(long, global = true)]
    pub queue_capacity: Option<usize>,

    /// Timeout de classificação por job, em milissegundos.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Arquivo do modelo treinado (JSON). Sem ele, usa o classificador por palavras-chave.
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    /// Habilita logs de depuração (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classifica um ou mais textos e imprime os jobs finalizados.
    Classify {
        /// Textos a classificar, um job para cada.
        #[arg(required = true)]
        texts: Vec<String>,
    },

    /// Classifica cada linha não vazia de um arquivo e imprime um resumo.
    Batch {
        /// Arquivo com um texto por linha.
        file: PathBuf,
    },

    /// Demonstra submissão, acompanhamento, rejeição e consulta de id inexistente.
    Demo,
}

impl Cli {
    /// Aplica as flags da linha de comando sobre a configuração do arquivo.
    pub fn apply(&self, config: &mut VerdictConfig) {
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = Some(capacity);
        }
        if let Some(timeout) = self.timeout_ms {
            config.job_timeout_ms = Some(timeout);
        }
        if let Some(model) = &self.model {
            config.model_path = Some(model.clone());
        }
    }
}
