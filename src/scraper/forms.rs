//! Lookup-form discovery and submission.
//!
//! Forms are read into owned [`FormDescriptor`]s so that no parsed document
//! is held across a network await.

use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

use crate::error::ScrapeError;

static FORM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form").expect("valid static selector"));
static INPUT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input").expect("valid static selector"));

/// Input names that receive the service identifier.
pub const LOOKUP_KEYWORDS: [&str; 4] = ["service", "consumer", "account", "number"];
/// Narrower discovery set used by payment gateways.
pub const GATEWAY_KEYWORDS: [&str; 3] = ["service", "consumer", "account"];
/// Field name payment gateways expect the identifier under.
pub const GATEWAY_FIELD: &str = "consumerNumber";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

impl FormMethod {
    fn from_attr(attr: Option<&str>) -> Self {
        match attr {
            Some(m) if m.trim().eq_ignore_ascii_case("post") => FormMethod::Post,
            _ => FormMethod::Get,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormInput {
    pub name: Option<String>,
    pub value: String,
    /// Lower-cased tag markup, matched against discovery keywords.
    markup: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormDescriptor {
    pub action: Option<String>,
    pub method: FormMethod,
    pub inputs: Vec<FormInput>,
    markup: String,
}

/// A fully resolved request ready to hand to a [`Transport`](super::http_client::Transport).
#[derive(Debug, Clone, PartialEq)]
pub struct FormSubmission {
    pub method: FormMethod,
    pub url: Url,
    pub fields: Vec<(String, String)>,
}

pub fn discover_forms(html: &str) -> Vec<FormDescriptor> {
    let doc = Html::parse_document(html);

    doc.select(&FORM)
        .map(|form| {
            let inputs = form
                .select(&INPUT)
                .map(|input| FormInput {
                    name: input.value().attr("name").map(str::to_string),
                    value: input.value().attr("value").unwrap_or_default().to_string(),
                    markup: input.html().to_lowercase(),
                })
                .collect();

            FormDescriptor {
                action: form.value().attr("action").map(str::to_string),
                method: FormMethod::from_attr(form.value().attr("method")),
                inputs,
                markup: form.html().to_lowercase(),
            }
        })
        .collect()
}

fn name_matches(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

impl FormDescriptor {
    /// True when any input's markup mentions one of `keywords`.
    pub fn is_lookup(&self, keywords: &[&str]) -> bool {
        self.inputs
            .iter()
            .any(|i| keywords.iter().any(|k| i.markup.contains(k)))
    }

    pub fn mentions(&self, keyword: &str) -> bool {
        self.markup.contains(&keyword.to_lowercase())
    }

    /// Named inputs in document order; identifier-like names get `service_number`,
    /// everything else keeps its declared value.
    pub fn populate(&self, service_number: &str) -> Vec<(String, String)> {
        self.inputs
            .iter()
            .filter_map(|input| {
                let name = input.name.as_deref()?;
                let value = if name_matches(name, &LOOKUP_KEYWORDS) {
                    service_number.to_string()
                } else {
                    input.value.clone()
                };
                Some((name.to_string(), value))
            })
            .collect()
    }

    fn action_url(&self, base: &Url) -> Result<Url, ScrapeError> {
        let action = self
            .action
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(ScrapeError::MissingAction)?;
        Ok(base.join(action)?)
    }

    pub fn submission(
        &self,
        base: &Url,
        service_number: &str,
    ) -> Result<FormSubmission, ScrapeError> {
        Ok(FormSubmission {
            method: self.method,
            url: self.action_url(base)?,
            fields: self.populate(service_number),
        })
    }

    /// Payment-gateway variant: always a POST carrying only [`GATEWAY_FIELD`].
    pub fn gateway_submission(
        &self,
        base: &Url,
        service_number: &str,
    ) -> Result<FormSubmission, ScrapeError> {
        Ok(FormSubmission {
            method: FormMethod::Post,
            url: self.action_url(base)?,
            fields: vec![(GATEWAY_FIELD.to_string(), service_number.to_string())],
        })
    }
}

impl FormSubmission {
    /// Request URL; GET submissions carry their fields as query parameters.
    pub fn request_url(&self) -> Url {
        let mut url = self.url.clone();
        if self.method == FormMethod::Get && !self.fields.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.fields);
        }
        url
    }

    /// `application/x-www-form-urlencoded` body for POST submissions.
    pub fn encoded_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.fields)
            .finish()
    }
}
