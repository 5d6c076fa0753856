use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Latest loan/deduction ledger row of an employee.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Remittance {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub employee_number: String,
    #[serde(default)]
    pub nhmfc: f64,
    #[serde(default)]
    pub liquidating_cash: f64,
    #[serde(default)]
    pub gsis_salary_loan: f64,
    #[serde(default)]
    pub gsis_policy_loan: f64,
    #[serde(default)]
    pub gsis_arrears: f64,
    #[serde(default)]
    pub cpl: f64,
    #[serde(default)]
    pub mpl: f64,
    #[serde(default)]
    pub mpl_lite: f64,
    #[serde(default)]
    pub emergency_loan: f64,
    #[serde(default)]
    pub pagibig_fund_cont: f64,
    #[serde(default)]
    pub pagibig_2: f64,
    #[serde(default)]
    pub multi_purpose_loan: f64,
    #[serde(default)]
    pub landbank_salary_loan: f64,
    #[serde(default)]
    pub earist_credit_coop: f64,
    #[serde(default)]
    pub feu: f64,
}

impl Remittance {
    pub fn gsis_loans(&self) -> f64 {
        self.gsis_salary_loan
            + self.gsis_policy_loan
            + self.gsis_arrears
            + self.cpl
            + self.mpl
            + self.mpl_lite
            + self.emergency_loan
    }

    pub fn pagibig_total(&self) -> f64 {
        self.pagibig_fund_cont + self.pagibig_2 + self.multi_purpose_loan
    }

    /// Ledger items outside GSIS and Pag-IBIG.
    pub fn other_total(&self) -> f64 {
        self.nhmfc
            + self.liquidating_cash
            + self.landbank_salary_loan
            + self.earist_credit_coop
            + self.feu
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PhilHealth {
    pub id: u64,
    pub employee_number: String,
    #[schema(example = 750.0)]
    pub philhealth_contribution: f64,
}

#[cfg(test)]
mod tests {
    use super::Remittance;

    #[test]
    fn buckets_do_not_overlap() {
        let r = Remittance {
            nhmfc: 1.0,
            liquidating_cash: 2.0,
            gsis_salary_loan: 4.0,
            gsis_policy_loan: 8.0,
            gsis_arrears: 16.0,
            cpl: 32.0,
            mpl: 64.0,
            mpl_lite: 128.0,
            emergency_loan: 256.0,
            pagibig_fund_cont: 512.0,
            pagibig_2: 1024.0,
            multi_purpose_loan: 2048.0,
            landbank_salary_loan: 4096.0,
            earist_credit_coop: 8192.0,
            feu: 16384.0,
            ..Default::default()
        };
        let all = r.gsis_loans() + r.pagibig_total() + r.other_total();
        assert_eq!(all, 32767.0);
        assert_eq!(r.gsis_loans(), 508.0);
        assert_eq!(r.pagibig_total(), 3584.0);
    }
}
