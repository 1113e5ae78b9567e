use anyhow::Result;
use chrono::{Duration, NaiveDate};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::info;

use super::RecordSource;
use crate::dates::date_to_serial;
use crate::record::stage::{CHURNED, CLOSED_LOST, CUSTOMER, IDENTIFIED, PROSPECTING, QUALIFIED, WARM};
use crate::record::{fields, sheets, Dataset, Record, Value};

const COMPANY_PREFIXES: &[&str] = &[
    "Acme", "Globex", "Initech", "Umbrella", "Hooli", "Vandelay", "Stark", "Wayne", "Tyrell",
    "Cyberdyne", "Soylent", "Wonka", "Oscorp", "Massive", "Aperture", "Black Mesa",
];
const COMPANY_SUFFIXES: &[&str] = &["Labs", "Systems", "Group", "Holdings", "Logistics", "Health"];
const FIRST_NAMES: &[&str] = &[
    "Ava", "Ben", "Chloe", "Dev", "Elif", "Farah", "Gus", "Hana", "Ivan", "Jo", "Kai", "Lena",
];
const LAST_NAMES: &[&str] = &[
    "Okafor", "Silva", "Nguyen", "Schmidt", "Kowalski", "Haddad", "Moreau", "Tanaka", "Reyes",
];
const SEGMENTS: &[&str] = &["Enterprise", "Mid-Market", "SMB"];
const TERRITORIES: &[&str] = &["North America", "EMEA", "APAC", "LATAM"];
const CAMPAIGNS: &[&str] = &[
    "Spring Webinar", "Partner Summit", "Cold Outbound", "Paid Search", "Case Study Push",
];

/// Marker left in a small share of date cells so unparseable input shows up in every dataset.
pub const GARBAGE_DATE: &str = "pending";

/// Seeded generator for a plausible CRM snapshot ending at `as_of`.
/// Dates are spread over roughly the previous fifteen months in mixed encodings.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub accounts: usize,
    pub seed: u64,
    pub as_of: NaiveDate,
}

impl SyntheticSource {
    pub fn new(accounts: usize, seed: u64, as_of: NaiveDate) -> Self {
        Self {
            accounts,
            seed,
            as_of,
        }
    }

    pub fn generate(&self) -> Dataset {
        let mut gen = Generator {
            rng: StdRng::seed_from_u64(self.seed),
            as_of: self.as_of,
        };

        let mut accounts = Vec::with_capacity(self.accounts);
        let mut contacts = Vec::new();
        for i in 0..self.accounts {
            let account = gen.account(i);
            for j in 0..gen.rng.gen_range(1..=3) {
                contacts.push(gen.contact(&account, i, j));
            }
            accounts.push(account);
        }

        let campaigns = (0..contacts.len() / 2)
            .map(|_| {
                let contact = &contacts[gen.rng.gen_range(0..contacts.len())];
                let mut row = Record::new().with(fields::CAMPAIGN_NAME, gen.pick(CAMPAIGNS));
                if let Some(name) = contact.text(fields::CONTACT_NAME) {
                    row.insert(fields::CONTACT_NAME, name);
                }
                row
            })
            .collect();

        Dataset::new()
            .with_sheet(sheets::ACCOUNTS, accounts)
            .with_sheet(sheets::CONTACTS, contacts)
            .with_sheet(sheets::CAMPAIGNS, campaigns)
    }
}

impl RecordSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("synthetic ({} accounts, seed {})", self.accounts, self.seed)
    }

    #[tracing::instrument(level = "info", skip(self), fields(accounts = self.accounts, seed = self.seed))]
    fn load(&self) -> Result<Dataset> {
        let data = self.generate();
        info!(rows = data.total_rows(), "synthetic dataset generated");
        Ok(data)
    }
}

struct Generator {
    rng: StdRng,
    as_of: NaiveDate,
}

/// Funnel milestones reached by one account or contact.
struct Milestones {
    stage: &'static str,
    created: NaiveDate,
    warmed: Option<NaiveDate>,
    qualified: Option<NaiveDate>,
    disqualified: Option<NaiveDate>,
    closed: Option<NaiveDate>,
}

impl Generator {
    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.rng.gen_range(0..items.len())]
    }

    fn stage(&mut self) -> &'static str {
        match self.rng.gen_range(0..100) {
            0..=9 => IDENTIFIED,
            10..=19 => PROSPECTING,
            20..=34 => WARM,
            35..=49 => QUALIFIED,
            50..=74 => CUSTOMER,
            75..=94 => CLOSED_LOST,
            _ => CHURNED,
        }
    }

    /// `from` plus a few days to a few weeks, never past the as-of date.
    fn after(&mut self, from: NaiveDate, min: i64, max: i64) -> NaiveDate {
        (from + Duration::days(self.rng.gen_range(min..=max))).min(self.as_of)
    }

    fn milestones(&mut self) -> Milestones {
        let stage = self.stage();
        let created = self.as_of - Duration::days(self.rng.gen_range(0..450));
        let mut m = Milestones {
            stage,
            created,
            warmed: None,
            qualified: None,
            disqualified: None,
            closed: None,
        };
        match stage {
            IDENTIFIED | PROSPECTING => {
                if self.rng.gen_bool(0.15) {
                    m.disqualified = Some(self.after(created, 5, 60));
                }
            }
            WARM => {
                let warmed = self.after(created, 3, 40);
                m.warmed = Some(warmed);
                if self.rng.gen_bool(0.25) {
                    m.disqualified = Some(self.after(warmed, 5, 45));
                }
            }
            _ => {
                let warmed = self.after(created, 3, 40);
                let qualified = self.after(warmed, 3, 40);
                m.warmed = Some(warmed);
                m.qualified = Some(qualified);
                if stage != QUALIFIED {
                    m.closed = Some(self.after(qualified, 7, 120));
                }
            }
        }
        m
    }

    /// One date in a randomly chosen encoding, occasionally unparseable.
    fn encode(&mut self, date: NaiveDate) -> Value {
        if self.rng.gen_bool(0.02) {
            return Value::Text(GARBAGE_DATE.to_string());
        }
        match self.rng.gen_range(0..4) {
            0 => Value::Number(date_to_serial(date)),
            1 => Value::Text(date.format("%Y-%m-%d").to_string()),
            2 => Value::Text(date.format("%m/%d/%Y").to_string()),
            _ => Value::Date(date),
        }
    }

    fn put_dates(&mut self, row: &mut Record, m: &Milestones) {
        let dates = [
            (fields::CREATED_DATE, Some(m.created)),
            (fields::WARMED_DATE, m.warmed),
            (fields::QUALIFIED_DATE, m.qualified),
            (fields::DISQUALIFIED_DATE, m.disqualified),
            (fields::CLOSED_DATE, m.closed),
        ];
        for (field, date) in dates {
            if let Some(d) = date {
                let value = self.encode(d);
                row.insert(field, value);
            }
        }
    }

    fn account(&mut self, index: usize) -> Record {
        let m = self.milestones();
        let name = format!(
            "{} {} {}",
            self.pick(COMPANY_PREFIXES),
            self.pick(COMPANY_SUFFIXES),
            index + 1
        );
        let mut row = Record::new()
            .with(fields::ACCOUNT_ID, format!("A-{:04}", index + 1))
            .with(fields::ACCOUNT_NAME, name)
            .with(fields::STAGE, m.stage)
            .with(fields::TERRITORY, self.pick(TERRITORIES));
        if self.rng.gen_bool(0.95) {
            let segment = self.pick(SEGMENTS);
            row.insert(fields::SEGMENT, segment);
        }
        if m.stage != IDENTIFIED {
            let arr = (self.rng.gen_range(10_000.0..250_000.0_f64) / 500.0).round() * 500.0;
            row.insert(fields::ARR, arr);
        }
        self.put_dates(&mut row, &m);
        row
    }

    fn contact(&mut self, account: &Record, account_index: usize, n: usize) -> Record {
        let m = self.milestones();
        let name = format!(
            "{} {} {}-{}",
            self.pick(FIRST_NAMES),
            self.pick(LAST_NAMES),
            account_index + 1,
            n + 1
        );
        let mut row = Record::new()
            .with(fields::CONTACT_NAME, name)
            .with(fields::STAGE, m.stage);
        // some contacts only carry the account name
        let link = if self.rng.gen_bool(0.8) {
            fields::ACCOUNT_ID
        } else {
            fields::ACCOUNT_NAME
        };
        if let Some(v) = account.text(link) {
            row.insert(link, v);
        }
        self.put_dates(&mut row, &m);
        row
    }
}
