use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::{
    error::ChaincodeError,
    ledger::{self, Account, Amount, Transaction},
    store::{StateStore, StoreError},
};

/// Functions reachable through [`AccountLedger::invoke`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    Init,
    Transfer,
    Delete,
    Query,
}

impl FromStr for Function {
    type Err = ChaincodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Function::Init),
            // "invoke" is the name older clients submit payments under
            "transfer" | "invoke" => Ok(Function::Transfer),
            "delete" => Ok(Function::Delete),
            "query" => Ok(Function::Query),
            other => Err(ChaincodeError::argument(format!(
                "Received unknown function invocation: {other}"
            ))),
        }
    }
}

/// Turns chaincode calls into reads, balance arithmetic and writes against a
/// [`StateStore`].
///
/// Accounts are created lazily with a zero balance the first time a key is
/// referenced.
#[derive(Debug)]
pub struct AccountLedger<S> {
    store: S,
}

impl<S: StateStore> AccountLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Deploy-time entry point: `[payer_key, payer_balance, payee_key, payee_balance]`.
    pub fn init(&mut self, args: &[String]) -> Result<Vec<u8>, ChaincodeError> {
        info!("init called, initializing chaincode");
        let [payer, payer_balance, payee, payee_balance] = args else {
            return Err(ChaincodeError::argument(
                "Incorrect number of arguments. Expecting 4",
            ));
        };
        self.bootstrap(payer, payer_balance, payee, payee_balance)?;
        Ok(Vec::new())
    }

    /// Dispatches a named function.
    pub fn invoke(&mut self, function: &str, args: &[String]) -> Result<Vec<u8>, ChaincodeError> {
        let function = function.parse::<Function>()?;
        debug!(?function, "dispatching invocation");
        match function {
            Function::Init => self.init(args),
            Function::Transfer => {
                let tx = parse_transfer(args)?;
                self.transfer(&tx)?;
                Ok(Vec::new())
            }
            Function::Delete => {
                let key = single_key(args, "Incorrect number of arguments. Expecting 1")?;
                self.delete(key)?;
                Ok(Vec::new())
            }
            Function::Query => {
                let key = single_key(
                    args,
                    "Incorrect number of arguments. Expecting name of the account to query",
                )?;
                self.query(key)
            }
        }
    }

    /// Legacy entry point kept for hosts that still call `run`.
    pub fn run(&mut self, function: &str, args: &[String]) -> Result<Vec<u8>, ChaincodeError> {
        debug!("run called, passing through to invoke");
        self.invoke(function, args)
    }

    /// Overwrites both records with fresh accounts holding the given balances.
    pub fn bootstrap(
        &mut self,
        payer_key: &str,
        payer_balance: &str,
        payee_key: &str,
        payee_balance: &str,
    ) -> Result<(), ChaincodeError> {
        let payer = Account::with_balance(parse_amount(payer_balance)?);
        let payee = Account::with_balance(parse_amount(payee_balance)?);

        let mut written = Vec::with_capacity(2);
        if payee_key != payer_key {
            written.push((payer_key, payer));
        } else {
            warn!(key = payer_key, "payer and payee are the same key, payee balance wins");
        }
        written.push((payee_key, payee));

        let writes = written
            .iter()
            .map(|(key, account)| Ok((key.to_string(), encode(key, account)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        self.store.put_batch(writes)?;

        for (key, account) in &written {
            info!(account = *key, balance = account.balance, "account persisted");
        }
        Ok(())
    }

    /// Moves `tx.value` from `tx.emp` to `tx.cpo` and appends `tx` to both
    /// histories. Negative balances are allowed.
    ///
    /// Unknown accounts start at zero and are written in the same batch as the
    /// updated balances, so a rejected transfer leaves the store untouched.
    pub fn transfer(&mut self, tx: &Transaction) -> Result<(), ChaincodeError> {
        let payer_key = tx.emp.as_str();
        let payee_key = tx.cpo.as_str();

        let mut payer = self.load_or_default(payer_key)?;
        debug!(account = payer_key, balance = payer.balance, "balance prior to transaction");

        if payer_key == payee_key {
            ledger::apply_self_transfer(&mut payer, tx);
            self.store
                .put_batch(vec![(payer_key.to_string(), encode(payer_key, &payer)?)])?;
            info!(account = payer_key, value = tx.value, "self-transfer recorded");
            return Ok(());
        }

        let mut payee = self.load_or_default(payee_key)?;
        debug!(account = payee_key, balance = payee.balance, "balance prior to transaction");

        ledger::apply_transfer(&mut payer, &mut payee, tx)?;

        self.store.put_batch(vec![
            (payer_key.to_string(), encode(payer_key, &payer)?),
            (payee_key.to_string(), encode(payee_key, &payee)?),
        ])?;

        info!(
            account = payer_key,
            balance = payer.balance,
            transactions = payer.transactions.len(),
            "balance after transaction"
        );
        info!(
            account = payee_key,
            balance = payee.balance,
            transactions = payee.transactions.len(),
            "balance after transaction"
        );
        Ok(())
    }

    /// Reads the account at `key`, persisting a zero-balance one if absent.
    pub fn get_or_create(&mut self, key: &str) -> Result<Account, ChaincodeError> {
        match self.store.get(key)? {
            Some(bytes) => Ok(decode(key, &bytes)?),
            None => {
                info!(account = key, "no account in the ledger yet, creating one");
                let account = Account::default();
                self.store.put(key, encode(key, &account)?)?;
                Ok(account)
            }
        }
    }

    fn load_or_default(&mut self, key: &str) -> Result<Account, ChaincodeError> {
        match self.store.get(key)? {
            Some(bytes) => Ok(decode(key, &bytes)?),
            None => {
                info!(account = key, "no account in the ledger yet, creating one");
                Ok(Account::default())
            }
        }
    }

    pub fn delete(&mut self, key: &str) -> Result<(), ChaincodeError> {
        self.store.delete(key)?;
        info!(account = key, "account deleted");
        Ok(())
    }

    /// Raw record at `key`.
    pub fn query(&mut self, key: &str) -> Result<Vec<u8>, ChaincodeError> {
        self.store
            .get(key)?
            .ok_or_else(|| ChaincodeError::NotFound(key.to_string()))
    }

    /// Decoded record at `key`.
    pub fn account(&mut self, key: &str) -> Result<Account, ChaincodeError> {
        let bytes = self.query(key)?;
        Ok(decode(key, &bytes)?)
    }

    pub fn balance(&mut self, key: &str) -> Result<Amount, ChaincodeError> {
        Ok(self.account(key)?.balance)
    }
}

/// Transfer arguments: either `[payer, payee, amount]` or one JSON
/// transaction.
pub fn parse_transfer(args: &[String]) -> Result<Transaction, ChaincodeError> {
    match args {
        [payer, payee, amount] => Ok(Transaction::payment(
            payer.as_str(),
            payee.as_str(),
            parse_amount(amount)?,
        )),
        [json] => {
            let tx: Transaction = serde_json::from_str(json).map_err(|e| {
                ChaincodeError::argument(format!("Invoke: Cannot unmarshal {json}: {e}"))
            })?;
            if tx.emp.is_empty() || tx.cpo.is_empty() {
                return Err(ChaincodeError::argument(
                    "Invoke: transaction must name both emp and cpo",
                ));
            }
            Ok(tx)
        }
        _ => Err(ChaincodeError::argument(
            "Invoke: Expecting payer, payee and amount, or one argument of type Transaction",
        )),
    }
}

fn parse_amount(raw: &str) -> Result<Amount, ChaincodeError> {
    raw.parse::<Amount>().map_err(|_| {
        ChaincodeError::argument(format!("Expecting integer value for amount, got {raw:?}"))
    })
}

fn single_key<'a>(args: &'a [String], msg: &str) -> Result<&'a str, ChaincodeError> {
    match args {
        [key] => Ok(key.as_str()),
        _ => Err(ChaincodeError::argument(msg)),
    }
}

fn encode(key: &str, account: &Account) -> Result<Vec<u8>, StoreError> {
    account.encode().map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })
}

fn decode(key: &str, bytes: &[u8]) -> Result<Account, StoreError> {
    Account::decode(bytes).map_err(|source| StoreError::Decode {
        key: key.to_string(),
        source,
    })
}
