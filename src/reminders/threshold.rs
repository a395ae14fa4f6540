use crate::models::Medicine;

/// Whether a refill reminder should exist for `medicine`.
///
/// True only when total, threshold and current quantities are all known and
/// the current stock has fallen to or below the threshold.
pub fn needs_refill_alert(medicine: &Medicine) -> bool {
    match (
        medicine.total_quantity,
        medicine.refill_threshold,
        medicine.current_quantity,
    ) {
        (Some(_), Some(threshold), Some(current)) => current <= threshold,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewMedicine, Recurrence};

    fn stocked(total: Option<i32>, threshold: Option<i32>, current: Option<i32>) -> Medicine {
        let mut m = NewMedicine::new("Aspirin", "1 tablet", &["08:00"], Recurrence::Daily)
            .into_medicine(1);
        m.total_quantity = total;
        m.refill_threshold = threshold;
        m.current_quantity = current;
        m
    }

    #[test]
    fn alerts_at_or_below_threshold() {
        assert!(needs_refill_alert(&stocked(Some(30), Some(5), Some(5))));
        assert!(needs_refill_alert(&stocked(Some(30), Some(5), Some(2))));
        assert!(needs_refill_alert(&stocked(Some(30), Some(5), Some(0))));
    }

    #[test]
    fn no_alert_above_threshold() {
        assert!(!needs_refill_alert(&stocked(Some(30), Some(5), Some(6))));
    }

    #[test]
    fn no_alert_when_any_quantity_missing() {
        assert!(!needs_refill_alert(&stocked(None, Some(5), Some(1))));
        assert!(!needs_refill_alert(&stocked(Some(30), None, Some(1))));
        assert!(!needs_refill_alert(&stocked(Some(30), Some(5), None)));
        assert!(!needs_refill_alert(&stocked(None, None, None)));
    }
}
