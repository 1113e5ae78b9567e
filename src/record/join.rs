use serde::Serialize;

use super::{fields, Dataset, Record};
use anyhow::Result;

#[derive(Debug, Clone, Serialize)]
pub struct ContactWithAccount<'a> {
    pub contact: &'a Record,
    pub account: Option<&'a Record>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignWithContact<'a> {
    pub campaign: &'a Record,
    pub contact: Option<ContactWithAccount<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinedCrm<'a> {
    pub accounts: &'a [Record],
    pub contacts: Vec<ContactWithAccount<'a>>,
    pub campaigns: Vec<CampaignWithContact<'a>>,
}

fn same(a: &Record, b: &Record, field: &str) -> bool {
    match (a.text(field), b.text(field)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Link contacts to their account (by Account ID, else Account Name) and
/// campaigns to their contact (by Contact Name). First match wins.
pub fn join_crm(data: &Dataset) -> Result<JoinedCrm<'_>> {
    let accounts = data.accounts()?;

    let contacts: Vec<ContactWithAccount<'_>> = data
        .contacts()?
        .iter()
        .map(|contact| ContactWithAccount {
            contact,
            account: accounts.iter().find(|acc| {
                same(acc, contact, fields::ACCOUNT_ID) || same(acc, contact, fields::ACCOUNT_NAME)
            }),
        })
        .collect();

    let campaigns = data
        .campaigns()?
        .iter()
        .map(|campaign| CampaignWithContact {
            campaign,
            contact: contacts
                .iter()
                .find(|c| same(c.contact, campaign, fields::CONTACT_NAME))
                .cloned(),
        })
        .collect();

    Ok(JoinedCrm {
        accounts,
        contacts,
        campaigns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sheets;

    #[test]
    fn joins_by_id_then_name() -> Result<()> {
        let data = Dataset::new()
            .with_sheet(
                sheets::ACCOUNTS,
                vec![
                    Record::new()
                        .with(fields::ACCOUNT_ID, "A-1")
                        .with(fields::ACCOUNT_NAME, "Acme"),
                    Record::new()
                        .with(fields::ACCOUNT_ID, "A-2")
                        .with(fields::ACCOUNT_NAME, "Globex"),
                ],
            )
            .with_sheet(
                sheets::CONTACTS,
                vec![
                    Record::new()
                        .with(fields::CONTACT_NAME, "Ann")
                        .with(fields::ACCOUNT_ID, "A-2"),
                    Record::new()
                        .with(fields::CONTACT_NAME, "Bob")
                        .with(fields::ACCOUNT_NAME, "Acme"),
                    Record::new().with(fields::CONTACT_NAME, "Cid"),
                ],
            )
            .with_sheet(
                sheets::CAMPAIGNS,
                vec![
                    Record::new()
                        .with(fields::CAMPAIGN_NAME, "Spring")
                        .with(fields::CONTACT_NAME, "Bob"),
                    Record::new().with(fields::CAMPAIGN_NAME, "Orphan"),
                ],
            );

        let joined = join_crm(&data)?;
        let name = |r: Option<&Record>| r.and_then(|r| r.text(fields::ACCOUNT_NAME));

        assert_eq!(name(joined.contacts[0].account).as_deref(), Some("Globex"));
        assert_eq!(name(joined.contacts[1].account).as_deref(), Some("Acme"));
        assert!(joined.contacts[2].account.is_none());

        let spring = joined.campaigns[0].contact.as_ref().expect("Bob is linked");
        assert_eq!(name(spring.account).as_deref(), Some("Acme"));
        assert!(joined.campaigns[1].contact.is_none());
        Ok(())
    }

    #[test]
    fn missing_contacts_sheet_fails() {
        let data = Dataset::new().with_sheet(sheets::ACCOUNTS, Vec::new());
        assert!(join_crm(&data).is_err());
    }
}
