//! Best-effort company and position extraction from sender, subject and body.

use std::collections::{BTreeMap, BTreeSet};

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use super::domain::RawEmail;

const PUBLIC_PROVIDERS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "icloud.com",
    "me.com",
    "aol.com",
    "protonmail.com",
    "proton.me",
];

// Applicant-tracking systems that send on behalf of employers.
const RELAY_DOMAINS: &[&str] = &[
    "greenhouse.io",
    "greenhouse-mail.io",
    "lever.co",
    "hire.lever.co",
    "myworkday.com",
    "workday.com",
    "smartrecruiters.com",
    "icims.com",
    "ashbyhq.com",
    "jobvite.com",
    "workablemail.com",
    "linkedin.com",
    "indeed.com",
];

const KNOWN_DOMAINS: &[(&str, &str)] = &[
    ("amazon.jobs", "Amazon"),
    ("metacareers.com", "Meta"),
    ("google.com", "Google"),
    ("microsoft.com", "Microsoft"),
    ("apple.com", "Apple"),
];

const SENDER_SUFFIXES: &[&str] = &[
    "talent acquisition",
    "hiring team",
    "recruiting",
    "recruitment",
    "careers",
    "talent",
    "jobs",
    "team",
    "hr",
];

// Words that can start or end a capitalized run without being a company name.
const SUBJECT_NOISE: &[&str] = &[
    "a",
    "an",
    "the",
    "our",
    "your",
    "you",
    "us",
    "we",
    "new",
    "exciting",
    "open",
    "next",
    "steps",
    "step",
    "interview",
    "interviews",
    "application",
    "applications",
    "applying",
    "apply",
    "role",
    "position",
    "opportunity",
    "team",
    "update",
    "confirmation",
    "offer",
    "phone",
    "video",
    "call",
    "schedule",
    "re",
    "fwd",
    "fw",
];

const TITLE_WORDS: &[&str] = &[
    "engineer",
    "developer",
    "manager",
    "designer",
    "analyst",
    "scientist",
    "intern",
    "lead",
    "director",
    "specialist",
    "consultant",
    "architect",
    "administrator",
    "coordinator",
    "associate",
    "researcher",
];

/// Lookup tables and limits used by [`FieldExtractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub known_domains: BTreeMap<String, String>,
    pub public_providers: BTreeSet<String>,
    pub relay_domains: BTreeSet<String>,
    pub sender_suffixes: Vec<String>,
    pub max_position_len: usize,
}

impl ExtractorConfig {
    pub fn with_known_domain(mut self, domain: &str, company: &str) -> Self {
        self.known_domains
            .insert(domain.trim().to_ascii_lowercase(), company.trim().to_string());
        self
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            known_domains: KNOWN_DOMAINS
                .iter()
                .map(|(domain, company)| (domain.to_string(), company.to_string()))
                .collect(),
            public_providers: PUBLIC_PROVIDERS.iter().map(|d| d.to_string()).collect(),
            relay_domains: RELAY_DOMAINS.iter().map(|d| d.to_string()).collect(),
            sender_suffixes: SENDER_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            max_position_len: 80,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedFields {
    pub company: String,
    pub position: String,
}

/// `"Display Name" <local@domain>` split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderAddress {
    pub display_name: String,
    pub address: String,
}

impl SenderAddress {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let (Some(lt), Some(gt)) = (trimmed.find('<'), trimmed.rfind('>')) {
            if lt < gt {
                return Self {
                    display_name: trimmed[..lt].trim().trim_matches('"').trim().to_string(),
                    address: trimmed[lt + 1..gt].trim().to_string(),
                };
            }
        }

        if trimmed.contains('@') {
            Self {
                display_name: String::new(),
                address: trimmed.trim_matches(|c| c == '<' || c == '>').to_string(),
            }
        } else {
            Self {
                display_name: trimmed.trim_matches('"').to_string(),
                address: String::new(),
            }
        }
    }

    pub fn domain(&self) -> Option<String> {
        let (_, domain) = self.address.rsplit_once('@')?;
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        let valid = !domain.is_empty()
            && domain
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
        valid.then_some(domain)
    }
}

pub struct FieldExtractor {
    config: ExtractorConfig,
    company_after_preposition: Regex,
    company_before_role: Regex,
    position_triggers: Vec<Regex>,
    position_delimiter: Regex,
}

impl FieldExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let capitalized_run = r"[A-Z][\w&'.-]*(?:\s+(?:[A-Z][\w&'.-]*|&))*";
        let company_after_preposition = Regex::new(&format!(
            r"\b(?:[Aa]t|[Ww]ith|[Ff]rom|[Jj]oin|[Tt]o)\s+({capitalized_run})"
        ))
        .expect("company pattern compiles");
        let company_before_role = Regex::new(&format!(
            r"({capitalized_run})\s+(?:[Pp]osition|[Rr]ole|[Oo]pportunity)\b"
        ))
        .expect("company pattern compiles");

        let position_triggers = [
            r"\b(?:position|role|job\s+title)\s*:\s*(?P<title>[^\r\n]+)",
            r"\bapplying\s+for\s+(?:the\s+|a\s+|an\s+|our\s+)?(?:position\s+of\s+)?(?P<title>[^\r\n]+)",
            r"\bapplication\s+for\s+(?:the\s+|a\s+|an\s+|our\s+)?(?:position\s+of\s+)?(?P<title>[^\r\n]+)",
            r"\bposition\s+of\s+(?P<title>[^\r\n]+)",
        ]
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("position pattern compiles")
        })
        .collect();

        let position_delimiter = RegexBuilder::new(
            r#"\s+(?:at|with|in|on|has|have|was|is|and|position|role|opening)\b|\s+[-–|]\s+|[.!?,;:()\[\]"]"#,
        )
        .case_insensitive(true)
        .build()
        .expect("delimiter pattern compiles");

        Self {
            config,
            company_after_preposition,
            company_before_role,
            position_triggers,
            position_delimiter,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn extract(&self, email: &RawEmail) -> ExtractedFields {
        ExtractedFields {
            company: self.company(email),
            position: self.position(email),
        }
    }

    pub fn company(&self, email: &RawEmail) -> String {
        let sender = SenderAddress::parse(&email.sender);
        let domain = sender.domain();

        if let Some(company) = domain.as_deref().and_then(|d| self.known_company(d)) {
            return company;
        }

        if let Some(company) = self.company_from_subject(&email.subject) {
            return company;
        }

        if let Some(company) = self.company_from_display_name(&sender, domain.as_deref()) {
            return company;
        }

        domain
            .as_deref()
            .and_then(|d| self.company_from_domain(d))
            .unwrap_or_default()
    }

    pub fn position(&self, email: &RawEmail) -> String {
        [email.subject.as_str(), email.body.as_str()]
            .into_iter()
            .find_map(|text| self.position_from_text(text))
            .unwrap_or_default()
    }

    fn known_company(&self, domain: &str) -> Option<String> {
        domain_candidates(domain)
            .find_map(|candidate| self.config.known_domains.get(candidate).cloned())
    }

    fn is_public_or_relay(&self, domain: &str) -> bool {
        domain_candidates(domain).any(|candidate| {
            self.config.public_providers.contains(candidate)
                || self.config.relay_domains.contains(candidate)
        })
    }

    fn company_from_subject(&self, subject: &str) -> Option<String> {
        let after_preposition = self
            .company_after_preposition
            .captures_iter(subject)
            .filter_map(|captures| captures.get(1))
            .find_map(|phrase| trim_noise(phrase.as_str()));
        if after_preposition.is_some() {
            return after_preposition;
        }

        self.company_before_role
            .captures_iter(subject)
            .filter_map(|captures| captures.get(1))
            .filter_map(|phrase| trim_noise(phrase.as_str()))
            .find(|phrase| !ends_with_title_word(phrase))
    }

    fn company_from_display_name(
        &self,
        sender: &SenderAddress,
        domain: Option<&str>,
    ) -> Option<String> {
        let name = sender.display_name.trim();
        if name.is_empty() || name.contains('@') || looks_automated(name) {
            return None;
        }

        let mut words: Vec<&str> = name.split_whitespace().collect();
        let mut stripped = false;
        loop {
            let lowered = words.join(" ").to_lowercase();
            let Some(suffix) = self
                .config
                .sender_suffixes
                .iter()
                .find(|suffix| lowered.ends_with(&format!(" {}", suffix.to_lowercase())))
            else {
                break;
            };
            let suffix_words = suffix.split_whitespace().count();
            words.truncate(words.len() - suffix_words);
            while matches!(words.last(), Some(&"-") | Some(&"|") | Some(&"@")) {
                words.pop();
            }
            stripped = true;
        }

        let company = words
            .join(" ")
            .trim_matches(|c: char| c == ',' || c == '-' || c == '|')
            .trim()
            .to_string();
        if company.is_empty() {
            return None;
        }

        // A bare personal name on a public mailbox says nothing about the employer.
        let personal_mailbox = domain.map_or(true, |d| self.is_public_or_relay(d));
        if !stripped && personal_mailbox {
            return None;
        }

        Some(company)
    }

    fn company_from_domain(&self, domain: &str) -> Option<String> {
        if self.is_public_or_relay(domain) {
            return None;
        }

        let labels: Vec<&str> = domain.split('.').filter(|l| !l.is_empty()).collect();
        let label = match labels.len() {
            0 => return None,
            1 => labels[0],
            n if n >= 3 && labels[n - 2].len() <= 3 && labels[n - 1].len() == 2 => labels[n - 3],
            n => labels[n - 2],
        };
        Some(title_case(label))
    }

    fn position_from_text(&self, text: &str) -> Option<String> {
        self.position_triggers.iter().find_map(|trigger| {
            trigger
                .captures_iter(text)
                .filter_map(|captures| captures.name("title"))
                .find_map(|title| self.clean_position(title.as_str()))
        })
    }

    fn clean_position(&self, raw: &str) -> Option<String> {
        let cut = match self.position_delimiter.find(raw) {
            Some(delimiter) => &raw[..delimiter.start()],
            None => raw,
        };
        let trimmed = cut.trim().trim_matches(|c: char| c == '\'' || c == '"');
        let capped: String = trimmed.chars().take(self.config.max_position_len).collect();
        let capped = capped.trim();

        let meaningful = capped
            .split_whitespace()
            .any(|word| !SUBJECT_NOISE.contains(&word.to_lowercase().as_str()));
        (meaningful && !capped.is_empty()).then(|| capped.to_string())
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

/// `careers.acme.com` yields `careers.acme.com`, then `acme.com`.
fn domain_candidates(domain: &str) -> impl Iterator<Item = &str> {
    let dots = domain.matches('.').count();
    domain
        .char_indices()
        .filter(|(_, c)| *c == '.')
        .map(|(index, _)| index + 1)
        .take(dots.saturating_sub(1))
        .map(move |start| &domain[start..])
        .chain(std::iter::once(domain))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
}

fn trim_noise(phrase: &str) -> Option<String> {
    let words: Vec<&str> = phrase
        .split_whitespace()
        .map(|word| word.trim_end_matches(|c: char| c == '.' || c == '\'' || c == '-'))
        .collect();
    let is_noise = |word: &&str| SUBJECT_NOISE.contains(&word.to_lowercase().as_str());

    let start = words.iter().position(|word| !is_noise(word))?;
    let end = words.iter().rposition(|word| !is_noise(word))?;
    let company = words[start..=end].join(" ");
    (!company.is_empty()).then_some(company)
}

fn ends_with_title_word(phrase: &str) -> bool {
    phrase
        .split_whitespace()
        .last()
        .map(|word| TITLE_WORDS.contains(&word.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn looks_automated(name: &str) -> bool {
    let lowered = name.to_lowercase();
    ["noreply", "no-reply", "no reply", "donotreply", "notifications", "mailer-daemon"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

fn title_case(label: &str) -> String {
    label
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
