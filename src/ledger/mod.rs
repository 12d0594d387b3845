use serde::{Deserialize, Serialize};

pub type AccountKey = String;
/// Signed amount in euro cents.
pub type Amount = i64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("balance of account {account} would overflow")]
    BalanceOverflow { account: AccountKey },
}

/// Charging session paid from an EMP account to a CPO account.
///
/// Stored by value in the history of both accounts. Field names are the
/// canonical snake_case ones; the capitalized names of older records are
/// accepted on read.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Transaction {
    #[serde(alias = "SessionID")]
    pub session_id: String,
    /// Payee key.
    #[serde(alias = "Cpo")]
    pub cpo: AccountKey,
    /// Payer key.
    #[serde(alias = "Emp")]
    pub emp: AccountKey,
    #[serde(alias = "Product")]
    pub product: String,
    #[serde(alias = "EvseID")]
    pub evse_id: String,
    #[serde(alias = "UserID")]
    pub user_id: String,
    #[serde(alias = "Timestamp")]
    pub timestamp: String,
    #[serde(alias = "ChargingDuration")]
    pub charging_duration: f64,
    #[serde(alias = "ChargedEnergy")]
    pub charged_energy: f64,
    #[serde(alias = "PricePerUnit")]
    pub price_per_unit: f64,
    #[serde(alias = "ValueBrutto")]
    pub value: Amount,
}

impl Transaction {
    /// Bare payment carrying only the parties and the amount.
    pub fn payment(emp: impl Into<AccountKey>, cpo: impl Into<AccountKey>, value: Amount) -> Self {
        Self {
            emp: emp.into(),
            cpo: cpo.into(),
            value,
            ..Self::default()
        }
    }
}

/// Balance and history of a single account.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Account {
    #[serde(alias = "BalanceBrutto")]
    pub balance: Amount,
    #[serde(alias = "Transactions")]
    pub transactions: Vec<Transaction>,
}

impl Account {
    pub fn with_balance(balance: Amount) -> Self {
        Self {
            balance,
            transactions: Vec::new(),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Net of all transaction values in the history, seen from `key`.
    pub fn history_net(&self, key: &str) -> Amount {
        self.transactions
            .iter()
            .map(|tx| {
                let mut net = 0;
                if tx.cpo == key {
                    net += tx.value;
                }
                if tx.emp == key {
                    net -= tx.value;
                }
                net
            })
            .sum()
    }
}

/// Moves `tx.value` from `payer` to `payee` and records `tx` in both histories.
///
/// Nothing is modified unless both new balances fit in an `Amount`.
pub fn apply_transfer(
    payer: &mut Account,
    payee: &mut Account,
    tx: &Transaction,
) -> Result<(), LedgerError> {
    let payer_balance =
        payer
            .balance
            .checked_sub(tx.value)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                account: tx.emp.clone(),
            })?;
    let payee_balance =
        payee
            .balance
            .checked_add(tx.value)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                account: tx.cpo.clone(),
            })?;
    payer.balance = payer_balance;
    payee.balance = payee_balance;
    payer.transactions.push(tx.clone());
    payee.transactions.push(tx.clone());
    Ok(())
}

/// Payment where payer and payee are the same account: the balance stays put
/// and the session is recorded once.
pub fn apply_self_transfer(account: &mut Account, tx: &Transaction) {
    account.transactions.push(tx.clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_moves_value_and_records_history() {
        let mut emp = Account::with_balance(100);
        let mut cpo = Account::with_balance(50);
        let tx = Transaction::payment("emp", "cpo", 30);
        apply_transfer(&mut emp, &mut cpo, &tx).unwrap();
        assert_eq!(emp.balance, 70);
        assert_eq!(cpo.balance, 80);
        assert_eq!(emp.transactions, vec![tx.clone()]);
        assert_eq!(cpo.transactions, vec![tx]);
    }

    #[test]
    fn overdraft_is_allowed() {
        let mut emp = Account::default();
        let mut cpo = Account::default();
        apply_transfer(&mut emp, &mut cpo, &Transaction::payment("emp", "cpo", 250)).unwrap();
        assert_eq!(emp.balance, -250);
        assert_eq!(cpo.balance, 250);
    }

    #[test]
    fn overflow_leaves_both_accounts_untouched() {
        let mut emp = Account::with_balance(0);
        let mut cpo = Account::with_balance(Amount::MAX);
        let err = apply_transfer(&mut emp, &mut cpo, &Transaction::payment("emp", "cpo", 1))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::BalanceOverflow {
                account: "cpo".into()
            }
        );
        assert_eq!(emp, Account::with_balance(0));
        assert_eq!(cpo, Account::with_balance(Amount::MAX));
    }

    #[test]
    fn history_net_matches_balance_of_fresh_accounts() {
        let mut emp = Account::default();
        let mut cpo = Account::default();
        for value in [10, 25, -5] {
            apply_transfer(&mut emp, &mut cpo, &Transaction::payment("emp", "cpo", value))
                .unwrap();
        }
        assert_eq!(emp.history_net("emp"), emp.balance);
        assert_eq!(cpo.history_net("cpo"), cpo.balance);
    }

    #[test]
    fn legacy_field_names_are_read_and_canonical_names_written() {
        let legacy = br#"{
            "BalanceBrutto": 420,
            "Transactions": [{
                "SessionID": "s-1", "Cpo": "cpo", "Emp": "emp", "Product": "AC22",
                "EvseID": "DE*ABC*E1", "UserID": "u-7", "Timestamp": "2016-05-01T10:00:00Z",
                "ChargingDuration": 1.5, "ChargedEnergy": 11.0, "PricePerUnit": 0.3,
                "ValueBrutto": 330
            }]
        }"#;
        let account = Account::decode(legacy).unwrap();
        assert_eq!(account.balance, 420);
        assert_eq!(account.transactions[0].evse_id, "DE*ABC*E1");
        assert_eq!(account.transactions[0].value, 330);

        let json: serde_json::Value = serde_json::from_slice(&account.encode().unwrap()).unwrap();
        assert_eq!(json["balance"], 420);
        assert_eq!(json["transactions"][0]["session_id"], "s-1");
        assert!(json.get("BalanceBrutto").is_none());
    }

    #[test]
    fn missing_fields_default() {
        let tx: Transaction = serde_json::from_str(r#"{"emp":"a","cpo":"b","value":5}"#).unwrap();
        assert_eq!(tx, Transaction::payment("a", "b", 5));
        assert_eq!(Account::decode(b"{}").unwrap(), Account::default());
    }
}
