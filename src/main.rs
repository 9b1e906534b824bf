mod config;
mod custom_tools;
mod handlers;
mod llm;
mod report;
mod services;
#[cfg(test)]
mod testing;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use handlers::{check_tools_handler, pdf_search_handler, report_handler, Services};
use report::{ReportRequest, Strategy};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sql-report-agent", about = "Answer business questions with SQL-backed reports")]
struct Cli {
    /// Path to the TOML configuration
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a report for a question
    Report {
        question: String,
        #[arg(long)]
        db: String,
        #[arg(long, value_enum, default_value_t = Strategy::SinglePass)]
        strategy: Strategy,
        /// Answers to earlier clarifying questions
        #[arg(long, default_value = "")]
        clarifications: String,
        /// PDF ids to make available to the citations tool
        #[arg(long = "pdf")]
        pdf_ids: Vec<String>,
        #[arg(long)]
        web_search: bool,
        /// Print the full result as JSON instead of markdown
        #[arg(long)]
        json: bool,
    },
    /// Validate the custom tool registry
    CheckTools,
    /// Search stored PDFs for context on a question and its SQL
    PdfSearch {
        question: String,
        #[arg(long, default_value = "")]
        sql: String,
        #[arg(long = "pdf", required = true)]
        pdf_ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;

    // RUST_LOG wins over the configured level
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();
    log::info!("Configuration loaded from {}", cli.config.display());

    let services = Services::from_config(&config)?;

    match cli.command {
        Command::Report {
            question,
            db,
            strategy,
            clarifications,
            pdf_ids,
            web_search,
            json,
        } => {
            let request = ReportRequest {
                question,
                db_name: db,
                clarification_responses: clarifications,
                pdf_file_ids: pdf_ids,
                use_websearch: web_search,
                strategy,
            };
            report_handler(&services, request, json).await
        }
        Command::CheckTools => check_tools_handler(&services).await,
        Command::PdfSearch {
            question,
            sql,
            pdf_ids,
        } => pdf_search_handler(&services, &question, &sql, &pdf_ids).await,
    }
}
