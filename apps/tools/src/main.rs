use anyhow::{ensure, Result};
use clap::{Parser, Subcommand};
use engine::{generate_board, Card, GRID_SIZE};
use rand::Rng;
use server_api::config::load_settings;
use shared::domain::{CardKind, Team};
use wordgen::{fallback::FALLBACK_WORDS, WordSupplier};

const GRID_COLUMNS: usize = 5;

#[derive(Parser, Debug)]
struct Cli {
    /// Skip the external generator even if an API key is configured.
    #[arg(long)]
    offline: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the words the server would use for a board.
    Words {
        #[arg(long)]
        theme: Option<String>,
        #[arg(long, default_value_t = GRID_SIZE)]
        count: usize,
    },
    /// Print a generated board with its categories.
    Board {
        #[arg(long)]
        theme: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let supplier = if cli.offline {
        WordSupplier::fallback_only()
    } else {
        load_settings().word_supplier()?
    };

    match cli.command {
        Command::Words { theme, count } => {
            let count = checked_count(count)?;
            for word in supplier.supply(theme.as_deref(), count).await {
                println!("{word}");
            }
        }
        Command::Board { theme } => {
            let words = supplier.supply(theme.as_deref(), GRID_SIZE).await;
            let mut rng = rand::thread_rng();
            let starting_team = if rng.gen_bool(0.5) {
                Team::Red
            } else {
                Team::Blue
            };
            let (cards, remaining) = generate_board(&words, starting_team, &mut rng)?;
            println!(
                "{starting_team} starts: red {} / blue {}",
                remaining.get(Team::Red),
                remaining.get(Team::Blue)
            );
            print_grid(&cards);
        }
    }

    Ok(())
}

/// The supplier can only promise as many words as the built-in pool holds.
fn checked_count(count: usize) -> Result<usize> {
    ensure!(count > 0, "count must be positive");
    ensure!(
        count <= FALLBACK_WORDS.len(),
        "count must be at most {}",
        FALLBACK_WORDS.len()
    );
    Ok(count)
}

fn print_grid(cards: &[Card]) {
    let width = cards.iter().map(|card| card.word.len()).max().unwrap_or(0) + 4;
    for row in cards.chunks(GRID_COLUMNS) {
        let line: Vec<String> = row
            .iter()
            .map(|card| format!("{:<width$}", format!("{}:{}", tag(card.kind), card.word)))
            .collect();
        println!("{}", line.join(" ").trim_end());
    }
}

fn tag(kind: CardKind) -> char {
    match kind {
        CardKind::Red => 'R',
        CardKind::Blue => 'B',
        CardKind::Neutral => '.',
        CardKind::Trap => 'X',
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
