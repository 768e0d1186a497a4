//! Random-value provider handed to definition and state generators

use std::cell::RefCell;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

thread_local! {
    static RNG: RefCell<StdRng> = RefCell::new(StdRng::from_entropy());
}

/// Re-seed the generator for deterministic output on the current thread
pub fn seed(seed: u64) {
    RNG.with(|rng| *rng.borrow_mut() = StdRng::seed_from_u64(seed));
}

fn pick<'a>(options: &[&'a str]) -> &'a str {
    RNG.with(|rng| options.choose(&mut *rng.borrow_mut()).copied().unwrap_or(""))
}

const FIRST_NAMES: &[&str] = &[
    "Ada", "Bruno", "Clara", "Dmitri", "Elena", "Felix", "Greta", "Hugo", "Ines", "Jonas",
    "Karim", "Lena", "Marta", "Nils", "Oskar", "Priya", "Ravi", "Sofia", "Tomas", "Vera",
];

const LAST_NAMES: &[&str] = &[
    "Almeida", "Berg", "Castro", "Dvorak", "Eriksen", "Fontaine", "Gruber", "Haddad",
    "Ivanov", "Jensen", "Kovacs", "Larsen", "Moreau", "Novak", "Okafor", "Petrov",
    "Rossi", "Silva", "Tanaka", "Weber",
];

const DOMAINS: &[&str] = &["example.com", "example.org", "example.net", "mail.test", "dev.invalid"];

const COMPANY_HEADS: &[&str] = &["Northwind", "Apex", "Bluewater", "Ironwood", "Skyline", "Quartz"];
const COMPANY_TAILS: &[&str] = &["Labs", "Works", "Partners", "Industries", "Holdings", "Supply"];

const WORDS: &[&str] = &[
    "record", "signal", "ledger", "harbor", "lattice", "orchard", "meadow", "cascade",
    "anchor", "beacon", "canyon", "drift", "ember", "fjord", "grove", "summit",
];

/// Opaque random-value provider injected into generators and callbacks
///
/// All instances share a thread-local seedable generator, so a provider is
/// cheap to copy and safe to hand out by reference.
#[derive(Debug, Default, Clone, Copy)]
pub struct Faker;

impl Faker {
    pub fn new() -> Self {
        Faker
    }

    /// Random integer in `min..=max`
    pub fn number(&self, min: i64, max: i64) -> i64 {
        RNG.with(|rng| rng.borrow_mut().gen_range(min..=max))
    }

    /// Random boolean, true with the given probability (0.0..=1.0)
    pub fn boolean(&self, probability: f64) -> bool {
        RNG.with(|rng| rng.borrow_mut().gen_bool(probability))
    }

    pub fn uuid(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn first_name(&self) -> String {
        pick(FIRST_NAMES).to_string()
    }

    pub fn last_name(&self) -> String {
        pick(LAST_NAMES).to_string()
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.first_name(), self.last_name())
    }

    pub fn username(&self) -> String {
        format!(
            "{}.{}{}",
            self.first_name().to_lowercase(),
            self.last_name().to_lowercase(),
            self.number(1, 999)
        )
    }

    pub fn email(&self) -> String {
        format!("{}@{}", self.username(), pick(DOMAINS))
    }

    pub fn company(&self) -> String {
        format!("{} {}", pick(COMPANY_HEADS), pick(COMPANY_TAILS))
    }

    pub fn phone(&self) -> String {
        format!(
            "({}) {}-{:04}",
            self.number(200, 999),
            self.number(200, 999),
            self.number(0, 9999)
        )
    }

    pub fn word(&self) -> String {
        pick(WORDS).to_string()
    }

    pub fn sentence(&self) -> String {
        let count = self.number(4, 9);
        let mut words: Vec<String> = (0..count).map(|_| self.word()).collect();
        if let Some(first) = words.first_mut() {
            let mut chars = first.chars();
            if let Some(head) = chars.next() {
                *first = head.to_uppercase().collect::<String>() + chars.as_str();
            }
        }
        format!("{}.", words.join(" "))
    }

    pub fn paragraph(&self) -> String {
        let count = self.number(3, 6);
        let sentences: Vec<String> = (0..count).map(|_| self.sentence()).collect();
        sentences.join(" ")
    }

    pub fn url(&self) -> String {
        format!("https://{}/{}", pick(DOMAINS), self.word())
    }

    /// Datetime within the last year
    pub fn past_datetime(&self) -> DateTime<Utc> {
        Utc::now()
            - Duration::days(self.number(0, 365))
            - Duration::minutes(self.number(0, 1440))
    }

    /// Datetime within the next year
    pub fn future_datetime(&self) -> DateTime<Utc> {
        Utc::now()
            + Duration::days(self.number(1, 365))
            + Duration::minutes(self.number(0, 1440))
    }
}
