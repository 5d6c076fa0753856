//! Payroll arithmetic for one employee and period. Money is rounded to centavos
//! at every step so stored figures add up exactly as printed.

use crate::model::remittance::Remittance;

pub const WORKING_DAYS_PER_MONTH: f64 = 22.0;
pub const WORK_MINUTES_PER_DAY: f64 = 480.0;
/// GSIS personal share (personal life and retirement insurance).
pub const PLRI_RATE: f64 = 0.09;
/// Personnel Economic Relief Allowance.
pub const DEFAULT_PERA: f64 = 2000.0;

#[derive(Debug, Clone, Default)]
pub struct PayrollInputs {
    /// Monthly rate from the salary grade table
    pub rate: f64,
    pub increment: f64,
    pub pera: f64,
    pub days_absent: i32,
    pub tardiness_minutes: i32,
    pub withholding_tax: f64,
    pub philhealth: f64,
    pub remittance: Remittance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PayrollBreakdown {
    pub abs_deduction: f64,
    pub gross_salary: f64,
    pub personal_life_retirement_ins: f64,
    pub total_gsis_deds: f64,
    pub philhealth: f64,
    pub total_pagibig_deds: f64,
    pub total_other_deds: f64,
    pub total_deductions: f64,
    pub net_salary: f64,
    pub pay1st: f64,
    pub pay2nd: f64,
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn compute(inputs: &PayrollInputs) -> PayrollBreakdown {
    let daily = inputs.rate / WORKING_DAYS_PER_MONTH;
    let per_minute = daily / WORK_MINUTES_PER_DAY;

    let abs_deduction = round2(
        daily * f64::from(inputs.days_absent.max(0))
            + per_minute * f64::from(inputs.tardiness_minutes.max(0)),
    );
    let gross_salary = round2(inputs.rate + inputs.increment + inputs.pera - abs_deduction);

    let personal_life_retirement_ins = round2(inputs.rate * PLRI_RATE);
    let total_gsis_deds = round2(personal_life_retirement_ins + inputs.remittance.gsis_loans());
    let philhealth = round2(inputs.philhealth);
    let total_pagibig_deds = round2(inputs.remittance.pagibig_total());
    let total_other_deds = round2(inputs.remittance.other_total() + philhealth);

    let total_deductions = round2(
        inputs.withholding_tax + total_gsis_deds + total_pagibig_deds + total_other_deds,
    );
    let net_salary = round2(gross_salary - total_deductions);

    // first quincena takes whole pesos, the second gets the centavos
    let pay1st = if net_salary > 0.0 {
        (net_salary / 2.0).floor()
    } else {
        0.0
    };
    let pay2nd = round2(net_salary - pay1st);

    PayrollBreakdown {
        abs_deduction,
        gross_salary,
        personal_life_retirement_ins,
        total_gsis_deds,
        philhealth,
        total_pagibig_deds,
        total_other_deds,
        total_deductions,
        net_salary,
        pay1st,
        pay2nd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.005
    }

    fn sample() -> PayrollInputs {
        PayrollInputs {
            rate: 30024.0,
            increment: 0.0,
            pera: DEFAULT_PERA,
            days_absent: 1,
            tardiness_minutes: 30,
            withholding_tax: 1000.0,
            philhealth: 750.6,
            remittance: Remittance {
                gsis_salary_loan: 500.0,
                pagibig_fund_cont: 200.0,
                ..Default::default()
            },
        }
    }

    #[test]
    fn computes_full_breakdown() {
        let b = compute(&sample());
        assert!(close(b.abs_deduction, 1450.02), "{b:?}");
        assert!(close(b.gross_salary, 30573.98));
        assert!(close(b.personal_life_retirement_ins, 2702.16));
        assert!(close(b.total_gsis_deds, 3202.16));
        assert!(close(b.total_pagibig_deds, 200.0));
        assert!(close(b.total_other_deds, 750.6));
        assert!(close(b.total_deductions, 5152.76));
        assert!(close(b.net_salary, 25421.22));
        assert!(close(b.pay1st, 12710.0));
        assert!(close(b.pay2nd, 12711.22));
    }

    #[test]
    fn halves_always_sum_to_net() {
        let b = compute(&sample());
        assert!(close(b.pay1st + b.pay2nd, b.net_salary));
    }

    #[test]
    fn perfect_attendance_has_no_absence_deduction() {
        let inputs = PayrollInputs {
            days_absent: 0,
            tardiness_minutes: 0,
            ..sample()
        };
        let b = compute(&inputs);
        assert_eq!(b.abs_deduction, 0.0);
        assert!(close(b.gross_salary, 32024.0));
    }

    #[test]
    fn negative_net_pays_nothing_up_front() {
        let inputs = PayrollInputs {
            rate: 1000.0,
            pera: 0.0,
            withholding_tax: 5000.0,
            ..Default::default()
        };
        let b = compute(&inputs);
        assert!(b.net_salary < 0.0);
        assert_eq!(b.pay1st, 0.0);
        assert!(close(b.pay2nd, b.net_salary));
    }
}
