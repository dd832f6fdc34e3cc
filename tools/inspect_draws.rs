//! Draw store inspection
//!
//! Prints every draw with its progress, winners and payout receipts. Run it
//! against a stopped engine; RocksDB allows one process per directory.

use bingo_settlement::{DrawStore, Tier};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "inspect_draws")]
#[command(about = "Inspect draws in a bingo engine data directory", long_about = None)]
struct Args {
    /// Database directory
    #[arg(long, default_value = "./DB/bingo_data")]
    db_path: String,

    /// Only show this draw, including its cards
    #[arg(long)]
    draw: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let store = DrawStore::open_path(&args.db_path)?;

    let draws = match &args.draw {
        Some(id) => vec![store.load_draw(id)?],
        None => store.list_draws()?,
    };

    println!("{} draw(s) in {}", draws.len(), args.db_path);

    for draw in &draws {
        println!();
        println!("{}  {}", draw.id, draw.name);
        println!(
            "  status={} phase={} mode={:?} scheduled={}",
            draw.status, draw.current_phase, draw.mode, draw.scheduled_at
        );
        println!(
            "  cards_sold={} price={} drawn={}/90",
            draw.cards_sold,
            draw.card_price,
            draw.drawn_numbers.len()
        );

        for tier in Tier::ALL {
            if let Some(card_id) = draw.tier_winner(tier) {
                println!("  winner {:<6} {}", tier.as_str(), card_id);
            }
        }

        for receipt in store.load_payouts(&draw.id)? {
            println!(
                "  paid   {:<6} {} cents to {} at {}",
                receipt.tier.as_str(), receipt.prize, receipt.user_id, receipt.settled_at
            );
        }

        if args.draw.is_some() {
            for card in store.load_cards(&draw.id)? {
                println!("  card #{} {} owner={} {:?}", card.serial, card.id, card.user_id, card.numbers);
            }
        }
    }

    Ok(())
}
