//! Subscription-type derivation from billing fields.

use dashboard_core::models::{ClassifiedDataset, ClassifiedRecord, Dataset, SubscriptionType};

/// Classify one record's billing fields. First match wins, case-insensitive:
///
/// 1. bill method contains `DIGITAL`, or rate code contains `D` → Digital
/// 2. bill method contains `PRINT`, or rate code contains `P` → Print
/// 3. bill method contains `BUNDLE`, or rate code contains `B` → Bundle
/// 4. otherwise → Other
///
/// The rate-code test is single-letter containment, so `"STD"` is Digital.
pub fn classify(bill_method: &str, rate_code: &str) -> SubscriptionType {
    let bill = bill_method.to_uppercase();
    let rate = rate_code.to_uppercase();

    if bill.contains("DIGITAL") || rate.contains('D') {
        SubscriptionType::Digital
    } else if bill.contains("PRINT") || rate.contains('P') {
        SubscriptionType::Print
    } else if bill.contains("BUNDLE") || rate.contains('B') {
        SubscriptionType::Bundle
    } else {
        SubscriptionType::Other
    }
}

/// Derive the subscription type of every record. Missing billing fields
/// classify as empty text.
pub fn classify_dataset(dataset: &Dataset) -> ClassifiedDataset {
    let records = dataset
        .records
        .iter()
        .map(|record| ClassifiedRecord {
            subscription_type: classify(
                record.bill_method.as_deref().unwrap_or(""),
                record.rate_code.as_deref().unwrap_or(""),
            ),
            record: record.clone(),
        })
        .collect();

    ClassifiedDataset { records }
}
