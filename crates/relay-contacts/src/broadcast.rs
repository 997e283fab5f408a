//! One-shot template broadcast

use std::path::Path;

use relay_whatsapp::MessageSender;
use tracing::{error, info};

use crate::error::Result;
use crate::spreadsheet::read_phone_numbers;

/// Counts from one broadcast pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Send the template to every number, sequentially and in order.
///
/// A failed send is logged and the loop moves on.
pub async fn broadcast_template(sender: &dyn MessageSender, phones: &[String]) -> BroadcastSummary {
    let mut summary = BroadcastSummary::default();

    for phone in phones {
        match sender.send_template(phone).await {
            Ok(_) => summary.sent += 1,
            Err(e) => {
                error!("Template send to {} failed: {}", phone, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Broadcast finished: {} sent, {} failed",
        summary.sent, summary.failed
    );
    summary
}

/// Read the contact spreadsheet and broadcast to it.
///
/// Spreadsheet problems abort before any message goes out.
pub async fn send_bulk_from_spreadsheet<P: AsRef<Path>>(
    sender: &dyn MessageSender,
    path: P,
) -> Result<BroadcastSummary> {
    let phones = read_phone_numbers(path)?;
    Ok(broadcast_template(sender, &phones).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContactsError;
    use async_trait::async_trait;
    use relay_whatsapp::{SendReceipt, WhatsAppError};
    use rust_xlsxwriter::Workbook;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        templates: Mutex<Vec<String>>,
        reject: Vec<String>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_template(&self, to: &str) -> relay_whatsapp::Result<SendReceipt> {
            self.templates.lock().unwrap().push(to.to_string());
            if self.reject.iter().any(|r| r == to) {
                return Err(WhatsAppError::Delivery {
                    status: 400,
                    body: "invalid recipient".to_string(),
                });
            }
            Ok(SendReceipt {
                status: 200,
                body: "{}".to_string(),
            })
        }

        async fn send_text(&self, _to: &str, _body: &str) -> relay_whatsapp::Result<SendReceipt> {
            panic!("broadcast must only send templates");
        }
    }

    fn write_contacts(path: &Path, phones: &[&str]) {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "phone").unwrap();
        for (i, phone) in phones.iter().enumerate() {
            worksheet.write_string(i as u32 + 1, 0, *phone).unwrap();
        }
        workbook.save(path).unwrap();
    }

    #[tokio::test]
    async fn test_two_rows_two_sends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.xlsx");
        write_contacts(&path, &["15551230001", "15551230002"]);

        let sender = RecordingSender::default();
        let summary = send_bulk_from_spreadsheet(&sender, &path).await.unwrap();

        assert_eq!(summary, BroadcastSummary { sent: 2, failed: 0 });
        assert_eq!(
            *sender.templates.lock().unwrap(),
            vec!["15551230001".to_string(), "15551230002".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_send_does_not_stop_broadcast() {
        let sender = RecordingSender {
            reject: vec!["15551230002".to_string()],
            ..Default::default()
        };
        let phones = vec![
            "15551230001".to_string(),
            "15551230002".to_string(),
            "15551230003".to_string(),
        ];

        let summary = broadcast_template(&sender, &phones).await;

        assert_eq!(summary, BroadcastSummary { sent: 2, failed: 1 });
        assert_eq!(sender.templates.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_bad_spreadsheet_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.xlsx");

        let mut workbook = Workbook::new();
        workbook
            .add_worksheet()
            .write_string(0, 0, "mobile")
            .unwrap();
        workbook.save(&path).unwrap();

        let sender = RecordingSender::default();
        let result = send_bulk_from_spreadsheet(&sender, &path).await;

        assert!(matches!(result, Err(ContactsError::MissingColumn(_))));
        assert!(sender.templates.lock().unwrap().is_empty());
    }
}
