mod cli;
mod infra;
mod routes;
mod server;
mod stages;

use ans_despesas::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
