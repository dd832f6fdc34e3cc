//! Account balances and card sales.
//!
//! Each function is one optimistic transaction; callers wrap them in the
//! conflict retry. Funds are always re-validated against the record read
//! inside the transaction.

use super::grid::generate_numbers;
use super::types::{Card, Cents, DrawStatus, Purchase, UserAccount};
use crate::errors::{BingoError, BingoResult};
use crate::storage::DrawStore;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub fn open_account(store: &DrawStore, user_id: &str, name: &str, now: DateTime<Utc>) -> BingoResult<UserAccount> {
    if name.trim().is_empty() {
        return Err(BingoError::InvalidRequest("account name is required".to_string()));
    }

    let txn = store.begin();
    if txn.account_exists(user_id)? {
        return Err(BingoError::InvalidRequest(format!("account {} already exists", user_id)));
    }

    let account = UserAccount {
        id: user_id.to_string(),
        name: name.trim().to_string(),
        balance: 0,
        total_deposited: 0,
        total_withdrawn: 0,
        total_won: 0,
        last_win_at: None,
        created_at: now,
    };
    txn.put_account(&account)?;
    txn.commit()?;
    Ok(account)
}

/// Credit a confirmed payment
pub fn confirm_deposit(store: &DrawStore, user_id: &str, amount: Cents) -> BingoResult<UserAccount> {
    if amount == 0 {
        return Err(BingoError::InvalidRequest("deposit amount must be positive".to_string()));
    }

    let txn = store.begin();
    let mut account = txn.account_for_update(user_id)?;
    account.balance = account
        .balance
        .checked_add(amount)
        .ok_or_else(|| BingoError::InvalidRequest("deposit overflows balance".to_string()))?;
    account.total_deposited = account.total_deposited.saturating_add(amount);
    txn.put_account(&account)?;
    txn.commit()?;
    Ok(account)
}

pub fn approve_withdrawal(store: &DrawStore, user_id: &str, amount: Cents) -> BingoResult<UserAccount> {
    if amount == 0 {
        return Err(BingoError::InvalidRequest("withdrawal amount must be positive".to_string()));
    }

    let txn = store.begin();
    let mut account = txn.account_for_update(user_id)?;
    if account.balance < amount {
        return Err(BingoError::InsufficientFunds {
            balance: account.balance,
            required: amount,
        });
    }
    account.balance -= amount;
    account.total_withdrawn = account.total_withdrawn.saturating_add(amount);
    txn.put_account(&account)?;
    txn.commit()?;
    Ok(account)
}

/// Buy `quantity` cards for a waiting draw. Serials continue from the draw's
/// `cards_sold`, which is incremented in the same transaction.
pub fn purchase_cards(
    store: &DrawStore,
    user_id: &str,
    draw_id: &str,
    quantity: u32,
    max_per_purchase: u32,
    now: DateTime<Utc>,
) -> BingoResult<Purchase> {
    if quantity == 0 || quantity > max_per_purchase {
        return Err(BingoError::InvalidRequest(format!(
            "quantity must be between 1 and {}",
            max_per_purchase
        )));
    }

    let txn = store.begin();
    let mut draw = txn.draw_for_update(draw_id)?;
    if draw.status != DrawStatus::Waiting {
        return Err(BingoError::InvalidTransition {
            draw_id: draw.id.clone(),
            action: "purchase cards",
            status: draw.status,
        });
    }

    let mut account = txn.account_for_update(user_id)?;
    let total_amount = draw
        .card_price
        .checked_mul(quantity as u64)
        .ok_or_else(|| BingoError::InvalidRequest("purchase total overflows".to_string()))?;
    if account.balance < total_amount {
        return Err(BingoError::InsufficientFunds {
            balance: account.balance,
            required: total_amount,
        });
    }

    let mut rng = rand::thread_rng();
    let mut card_ids = Vec::with_capacity(quantity as usize);
    for offset in 0..quantity as u64 {
        let card = Card {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            draw_id: draw_id.to_string(),
            serial: draw.cards_sold + offset,
            numbers: generate_numbers(&mut rng),
            purchased_at: now,
        };
        txn.put_card(&card)?;
        card_ids.push(card.id);
    }

    let purchase = Purchase {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        draw_id: draw_id.to_string(),
        quantity,
        total_amount,
        card_ids,
        created_at: now,
    };

    account.balance -= total_amount;
    draw.cards_sold += quantity as u64;

    txn.put_purchase(&purchase)?;
    txn.put_account(&account)?;
    txn.put_draw(&draw)?;
    txn.commit()?;

    Ok(purchase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bingo::types::{Draw, DrawMode, NewDraw, Payout};

    fn setup() -> (tempfile::TempDir, DrawStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DrawStore::open_path(dir.path()).unwrap();

        let draw = Draw::create(
            "d1".to_string(),
            NewDraw {
                name: "Sale".to_string(),
                scheduled_at: Utc::now(),
                card_price: 250,
                payout: Payout::Accumulated,
                mode: DrawMode::Manual,
                external_url: None,
            },
            Utc::now(),
        )
        .unwrap();
        let txn = store.begin();
        txn.put_draw(&draw).unwrap();
        txn.commit().unwrap();

        open_account(&store, "u1", "Ana", Utc::now()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_deposit_and_withdrawal_totals() {
        let (_dir, store) = setup();
        confirm_deposit(&store, "u1", 1_000).unwrap();
        let account = approve_withdrawal(&store, "u1", 400).unwrap();

        assert_eq!(account.balance, 600);
        assert_eq!(account.total_deposited, 1_000);
        assert_eq!(account.total_withdrawn, 400);

        assert!(matches!(
            approve_withdrawal(&store, "u1", 601),
            Err(BingoError::InsufficientFunds {
                balance: 600,
                required: 601
            })
        ));
    }

    #[test]
    fn test_duplicate_account_rejected() {
        let (_dir, store) = setup();
        assert!(open_account(&store, "u1", "Again", Utc::now()).is_err());
    }

    #[test]
    fn test_purchase_debits_and_assigns_serials() {
        let (_dir, store) = setup();
        confirm_deposit(&store, "u1", 1_000).unwrap();

        let first = purchase_cards(&store, "u1", "d1", 2, 10, Utc::now()).unwrap();
        let second = purchase_cards(&store, "u1", "d1", 1, 10, Utc::now()).unwrap();
        assert_eq!(first.total_amount, 500);
        assert_eq!(second.card_ids.len(), 1);

        let cards = store.load_cards("d1").unwrap();
        let serials: Vec<u64> = cards.iter().map(|c| c.serial).collect();
        assert_eq!(serials, vec![0, 1, 2]);
        assert_eq!(cards[2].id, second.card_ids[0]);

        assert_eq!(store.load_draw("d1").unwrap().cards_sold, 3);
        assert_eq!(store.load_account("u1").unwrap().balance, 250);
        assert_eq!(store.load_purchases("u1").unwrap().len(), 2);
    }

    #[test]
    fn test_purchase_without_funds_changes_nothing() {
        let (_dir, store) = setup();
        confirm_deposit(&store, "u1", 300).unwrap();

        assert!(matches!(
            purchase_cards(&store, "u1", "d1", 2, 10, Utc::now()),
            Err(BingoError::InsufficientFunds { .. })
        ));
        assert_eq!(store.load_draw("d1").unwrap().cards_sold, 0);
        assert!(store.load_cards("d1").unwrap().is_empty());
        assert_eq!(store.load_account("u1").unwrap().balance, 300);
    }

    #[test]
    fn test_purchase_quantity_bounds() {
        let (_dir, store) = setup();
        confirm_deposit(&store, "u1", 100_000).unwrap();
        assert!(purchase_cards(&store, "u1", "d1", 0, 10, Utc::now()).is_err());
        assert!(purchase_cards(&store, "u1", "d1", 11, 10, Utc::now()).is_err());
    }

    #[test]
    fn test_sales_close_once_draw_starts() {
        let (_dir, store) = setup();
        confirm_deposit(&store, "u1", 1_000).unwrap();

        let txn = store.begin();
        let mut draw = txn.draw_for_update("d1").unwrap();
        draw.start(Utc::now());
        txn.put_draw(&draw).unwrap();
        txn.commit().unwrap();

        assert!(matches!(
            purchase_cards(&store, "u1", "d1", 1, 10, Utc::now()),
            Err(BingoError::InvalidTransition { .. })
        ));
    }
}
