use divwatch_notify::AlertMessage;
use rust_decimal::Decimal;

use super::diff::AlertDecision;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Render the notification for a decision that crossed the threshold.
///
/// Returns `None` when the decision has no baseline or ratio to report.
pub fn alert_message(
    decision: &AlertDecision,
    threshold: Decimal,
    subject_prefix: &str,
) -> Option<AlertMessage> {
    let baseline = decision.baseline_event?;
    let ratio = decision.change_ratio?;
    let ticker = &decision.entity_id;
    let direction = if ratio.is_sign_negative() {
        "decreased"
    } else {
        "increased"
    };
    let change_pct = (ratio * HUNDRED).round_dp(2);
    let threshold_pct = (threshold * HUNDRED).normalize();

    let subject = format!("{subject_prefix}Dividend Alert: {ticker} - Significant Change Detected");
    let body = format!(
        "DIVIDEND ALERT for {ticker}\n\
         \n\
         New dividend: ${new_amount:.4} (paid {new_date})\n\
         Previous dividend: ${old_amount:.4} (paid {old_date})\n\
         Change: {change_pct:+}%\n\
         \n\
         The dividend has {direction} by at least {threshold_pct}%.\n",
        new_amount = decision.new_event.amount,
        new_date = decision.new_event.date,
        old_amount = baseline.amount,
        old_date = baseline.date,
    );
    Some(AlertMessage::new(subject, body))
}
