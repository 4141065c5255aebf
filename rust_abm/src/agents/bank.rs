use thiserror::Error;
use tracing::warn;

use crate::agents::AgentRef;
use crate::config::Config;

/// Errors raised by account operations.
///
/// None of these are business outcomes: each one means an agent tried to
/// spend money it had not secured, or to cash a cheque that was not meant
/// for it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),
    #[error("{holder}: insufficient cash, required {required}, available {available}")]
    InsufficientFunds {
        holder: AgentRef,
        required: i64,
        available: i64,
    },
    #[error("cheque payable to {payee} deposited on the account of {holder}")]
    WrongPayee { payee: AgentRef, holder: AgentRef },
    #[error("cheque issued in period {issued} deposited in period {period}")]
    StaleCheque { issued: u64, period: u64 },
}

// ─────────────────────────────────────────────────────────────────────────────
// Cheques and loans
// ─────────────────────────────────────────────────────────────────────────────

/// A payment instrument. Only an [`Account`] can issue one, and the money
/// leaves the drawer's account at issuance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cheque {
    drawer: AgentRef,
    payee: AgentRef,
    amount: i64,
    issued: u64,
}

impl Cheque {
    pub fn drawer(&self) -> AgentRef {
        self.drawer
    }

    pub fn payee(&self) -> AgentRef {
        self.payee
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }
}

#[derive(Clone, Debug)]
struct Loan {
    principal: i64,
    remaining_term: u32,
    long_term: bool,
}

impl Loan {
    /// Principal falling due at this period's debt service.
    fn instalment(&self) -> i64 {
        if !self.long_term || self.remaining_term <= 1 {
            self.principal
        } else {
            self.principal / self.remaining_term as i64
        }
    }
}

/// What one call to [`Account::service_debt`] moved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebtService {
    pub interest_paid: i64,
    pub repaid: i64,
    pub borrowed: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Account
// ─────────────────────────────────────────────────────────────────────────────

/// A bank account: cash plus the loans outstanding against it.
///
/// The account is owned by its holder. The bank never mutates it; it only
/// observes balances at closure.
#[derive(Clone, Debug)]
pub struct Account {
    holder: AgentRef,
    cash: i64,
    loans: Vec<Loan>,
    interest_due: i64,
    interest_paid: i64,
    canceled_debt: i64,
    borrowed: i64,
}

impl Account {
    pub fn new(holder: AgentRef) -> Self {
        Account {
            holder,
            cash: 0,
            loans: Vec::new(),
            interest_due: 0,
            interest_paid: 0,
            canceled_debt: 0,
            borrowed: 0,
        }
    }

    pub fn holder(&self) -> AgentRef {
        self.holder
    }

    /// Cash available on the account.
    pub fn amount(&self) -> i64 {
        self.cash
    }

    pub fn debt(&self) -> i64 {
        self.loans.iter().map(|l| l.principal).sum()
    }

    pub fn long_term_debt(&self) -> i64 {
        self.loans
            .iter()
            .filter(|l| l.long_term)
            .map(|l| l.principal)
            .sum()
    }

    pub fn short_term_debt(&self) -> i64 {
        self.debt() - self.long_term_debt()
    }

    /// Interest accrued for the current period.
    pub fn interests(&self) -> i64 {
        self.interest_due
    }

    pub fn interest_paid(&self) -> i64 {
        self.interest_paid
    }

    /// Debt cancelled during the current period (a loss for the bank).
    pub fn canceled_debt(&self) -> i64 {
        self.canceled_debt
    }

    /// Amount borrowed during the current period.
    pub fn borrowed(&self) -> i64 {
        self.borrowed
    }

    /// Start a new period: accrue interest on the outstanding debt.
    pub fn open(&mut self, rate: f64) {
        self.interest_due = (self.debt() as f64 * rate).round() as i64;
        self.interest_paid = 0;
        self.canceled_debt = 0;
        self.borrowed = 0;
    }

    /// Credit the account with an endowment that does not come from another
    /// account (initial household wealth).
    pub fn endow(&mut self, amount: i64) {
        self.cash += amount.max(0);
    }

    pub fn deposit(&mut self, cheque: Cheque, period: u64) -> Result<(), AccountError> {
        if cheque.payee != self.holder {
            return Err(AccountError::WrongPayee {
                payee: cheque.payee,
                holder: self.holder,
            });
        }
        if cheque.issued != period {
            return Err(AccountError::StaleCheque {
                issued: cheque.issued,
                period,
            });
        }
        self.cash += cheque.amount;
        Ok(())
    }

    pub fn issue_cheque(
        &mut self,
        payee: AgentRef,
        amount: i64,
        period: u64,
    ) -> Result<Cheque, AccountError> {
        if amount <= 0 {
            return Err(AccountError::NonPositiveAmount(amount));
        }
        if amount > self.cash {
            return Err(AccountError::InsufficientFunds {
                holder: self.holder,
                required: amount,
                available: self.cash,
            });
        }
        self.cash -= amount;
        Ok(Cheque {
            drawer: self.holder,
            payee,
            amount,
            issued: period,
        })
    }

    pub fn borrow(&mut self, amount: i64, term: u32, long_term: bool) -> Result<(), AccountError> {
        if amount <= 0 {
            return Err(AccountError::NonPositiveAmount(amount));
        }
        self.loans.push(Loan {
            principal: amount,
            remaining_term: term.max(1),
            long_term,
        });
        self.cash += amount;
        self.borrowed += amount;
        Ok(())
    }

    /// Pay this period's interest, then repay whatever principal falls due
    /// as far as cash allows.
    ///
    /// Interest is never left unpaid: a shortfall is covered by a
    /// short-term loan. Principal that cannot be repaid stays on the loan and
    /// falls due again next period.
    pub fn service_debt(&mut self, short_term: u32) -> Result<DebtService, AccountError> {
        let mut service = DebtService::default();
        let interest = self.interest_due - self.interest_paid;
        if interest > 0 {
            if self.cash < interest {
                let shortfall = interest - self.cash;
                warn!(holder = %self.holder, shortfall, "borrowing to pay interest");
                self.borrow(shortfall, short_term, false)?;
                service.borrowed = shortfall;
            }
            self.cash -= interest;
            self.interest_paid += interest;
            service.interest_paid = interest;
        }

        for loan in self.loans.iter_mut() {
            let payment = loan.instalment().min(self.cash);
            loan.principal -= payment;
            self.cash -= payment;
            service.repaid += payment;
            loan.remaining_term = loan.remaining_term.saturating_sub(1);
        }
        self.loans.retain(|l| l.principal > 0);
        Ok(service)
    }

    /// Cancel up to `amount` of debt: short-term loans first, then long-term
    /// loans, most recent first. Returns the amount actually cancelled.
    pub fn cancel_debt(&mut self, amount: i64) -> i64 {
        let mut left = amount.max(0);
        for long_term in [false, true] {
            for loan in self.loans.iter_mut().rev().filter(|l| l.long_term == long_term) {
                if left == 0 {
                    break;
                }
                let cut = loan.principal.min(left);
                loan.principal -= cut;
                left -= cut;
            }
        }
        self.loans.retain(|l| l.principal > 0);
        let canceled = amount.max(0) - left;
        self.canceled_debt += canceled;
        canceled
    }

    /// Repay as much outstanding debt as cash allows, regardless of terms.
    pub fn repay_all(&mut self) -> i64 {
        let mut repaid = 0;
        for loan in self.loans.iter_mut() {
            let payment = loan.principal.min(self.cash);
            loan.principal -= payment;
            self.cash -= payment;
            repaid += payment;
        }
        self.loans.retain(|l| l.principal > 0);
        repaid
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bank data
// ─────────────────────────────────────────────────────────────────────────────

/// Lending terms and the bank's view of the loan book.
///
/// Firms borrow on demand at the posted terms; the bank observes their
/// accounts once per period at closure.
#[derive(Clone, Debug)]
pub struct BankData {
    pub interest_rate: f64,
    pub short_term_periods: u32,
    pub long_term_periods: u32,
    pub loans: i64,
    pub new_lending: i64,
    pub interest_income: i64,
    pub losses: i64,
    pub cumulative_losses: i64,
}

impl BankData {
    pub fn new(config: &Config) -> Self {
        BankData {
            interest_rate: config.interest_rate,
            short_term_periods: config.short_term_loan_periods,
            long_term_periods: config.long_term_loan_periods,
            loans: 0,
            new_lending: 0,
            interest_income: 0,
            losses: 0,
            cumulative_losses: 0,
        }
    }

    /// Record the state of the loan book from the borrowers' accounts.
    pub fn observe<'a>(&mut self, accounts: impl IntoIterator<Item = &'a Account>) {
        self.loans = 0;
        self.new_lending = 0;
        self.interest_income = 0;
        self.losses = 0;
        for account in accounts {
            self.loans += account.debt();
            self.new_lending += account.borrowed();
            self.interest_income += account.interest_paid();
            self.losses += account.canceled_debt();
        }
        self.cumulative_losses += self.losses;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{FirmId, HouseholdId};

    fn firm_account(cash: i64) -> Account {
        let mut account = Account::new(AgentRef::Firm(FirmId(1)));
        account.endow(cash);
        account
    }

    #[test]
    fn cheque_moves_money_once() {
        let mut drawer = firm_account(100);
        let mut payee = Account::new(AgentRef::Household(HouseholdId(3)));
        let cheque = drawer
            .issue_cheque(AgentRef::Household(HouseholdId(3)), 40, 7)
            .unwrap();
        assert_eq!(drawer.amount(), 60);
        payee.deposit(cheque, 7).unwrap();
        assert_eq!(payee.amount(), 40);
    }

    #[test]
    fn cheque_rejected_by_wrong_payee_or_period() {
        let mut drawer = firm_account(100);
        let mut other = Account::new(AgentRef::Household(HouseholdId(4)));
        let cheque = drawer
            .issue_cheque(AgentRef::Household(HouseholdId(3)), 10, 1)
            .unwrap();
        assert!(matches!(
            other.deposit(cheque.clone(), 1),
            Err(AccountError::WrongPayee { .. })
        ));
        let mut payee = Account::new(AgentRef::Household(HouseholdId(3)));
        assert_eq!(
            payee.deposit(cheque, 2),
            Err(AccountError::StaleCheque { issued: 1, period: 2 })
        );
    }

    #[test]
    fn overdraft_is_refused() {
        let mut account = firm_account(10);
        let err = account.issue_cheque(AgentRef::Bank, 11, 0).unwrap_err();
        assert!(matches!(err, AccountError::InsufficientFunds { required: 11, available: 10, .. }));
        assert_eq!(account.amount(), 10);
    }

    #[test]
    fn interest_is_paid_with_forced_loan_when_cash_is_short() {
        let mut account = firm_account(0);
        account.borrow(1000, 10, true).unwrap();
        account.issue_cheque(AgentRef::Bank, 1000, 0).unwrap();
        account.open(0.05);
        assert_eq!(account.interests(), 50);
        let service = account.service_debt(1).unwrap();
        assert_eq!(service.interest_paid, 50);
        assert_eq!(service.borrowed, 50);
        assert_eq!(account.amount(), 0);
        assert_eq!(account.debt(), 1050);
    }

    #[test]
    fn long_term_loan_is_amortised() {
        let mut account = firm_account(0);
        account.borrow(1000, 4, true).unwrap();
        account.open(0.0);
        let service = account.service_debt(1).unwrap();
        assert_eq!(service.repaid, 250);
        assert_eq!(account.debt(), 750);
        assert_eq!(account.amount(), 750);
    }

    #[test]
    fn cancel_debt_hits_short_term_first() {
        let mut account = firm_account(0);
        account.borrow(500, 10, true).unwrap();
        account.borrow(200, 1, false).unwrap();
        let canceled = account.cancel_debt(300);
        assert_eq!(canceled, 300);
        assert_eq!(account.short_term_debt(), 0);
        assert_eq!(account.long_term_debt(), 400);
        assert_eq!(account.canceled_debt(), 300);
    }

    #[test]
    fn bank_observes_accounts() {
        let mut a = firm_account(0);
        a.borrow(100, 1, false).unwrap();
        let mut b = firm_account(0);
        b.borrow(50, 1, false).unwrap();
        b.cancel_debt(20);
        let mut bank = BankData::new(&Config::default());
        bank.observe([&a, &b]);
        assert_eq!(bank.loans, 130);
        assert_eq!(bank.losses, 20);
        assert_eq!(bank.new_lending, 150);
    }
}
