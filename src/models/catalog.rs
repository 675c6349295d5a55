use std::collections::HashSet;

use crate::error::LoadError;
use crate::models::dsl_model::RunParameters;

/// A single endpoint the harness calls every iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub name: String,
    /// May contain `{base}`, `{symbol}` and `{token}`.
    pub url_template: String,
    pub expected_status: u16,
}

impl EndpointDescriptor {
    pub fn new(name: impl Into<String>, url_template: impl Into<String>, expected_status: u16) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            expected_status,
        }
    }

    /// Plain substitution in a single pass over the template, so substituted
    /// values are never expanded again. Missing values resolve to empty
    /// strings and the resulting URL is requested anyway.
    pub fn resolve(&self, params: &RunParameters) -> String {
        let mut url = String::with_capacity(self.url_template.len() + params.base_url.len());
        let mut rest = self.url_template.as_str();

        while let Some(open) = rest.find('{') {
            url.push_str(&rest[..open]);
            rest = &rest[open..];

            let substitution = [
                ("{base}", params.base_url.trim_end_matches('/')),
                ("{symbol}", params.instrument_symbol.as_str()),
                ("{token}", params.instrument_token.as_str()),
            ]
            .into_iter()
            .find(|(placeholder, _)| rest.starts_with(placeholder));

            match substitution {
                Some((placeholder, value)) => {
                    url.push_str(value);
                    rest = &rest[placeholder.len()..];
                }
                None => {
                    url.push('{');
                    rest = &rest[1..];
                }
            }
        }
        url.push_str(rest);
        url
    }
}

/// Index of a descriptor within its catalog. Metric aggregates are laid out
/// in the same order, so this is also the aggregate handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(pub usize);

/// Ordered, immutable list of endpoints.
#[derive(Debug, Clone)]
pub struct Catalog {
    descriptors: Vec<EndpointDescriptor>,
}

impl Catalog {
    pub fn new(descriptors: Vec<EndpointDescriptor>) -> Result<Self, LoadError> {
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(LoadError::DuplicateEndpoint(descriptor.name.clone()));
            }
        }
        Ok(Self { descriptors })
    }

    pub fn list(&self) -> &[EndpointDescriptor] {
        &self.descriptors
    }

    pub fn iter(&self) -> impl Iterator<Item = (EndpointId, &EndpointDescriptor)> {
        self.descriptors
            .iter()
            .enumerate()
            .map(|(idx, descriptor)| (EndpointId(idx), descriptor))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// The instrument, notification, prediction, subscription and user
    /// endpoints of the trading API, in call order.
    pub fn standard() -> Self {
        let entries: [(&str, &str); 22] = [
            ("fetch_instruments", "{base}/instruments"),
            ("fetch_instrument_categories", "{base}/instruments/categories"),
            ("fetch_chart_symbol", "{base}/instruments/fetch-chart-symbol"),
            ("find_instrument_by_symbol", "{base}/instruments/find-by-symbol/{symbol}"),
            ("find_instrument_by_token", "{base}/instruments/find-by-token/{token}"),
            ("fetch_watchlist_ids", "{base}/instruments/watchlist-ids"),
            ("fetch_watchlists", "{base}/instruments/watchlists"),
            ("fetch_notifications", "{base}/notifications"),
            ("read_all_notifications", "{base}/notifications/read-all"),
            ("unread_notification_counts", "{base}/notifications/unread-counts"),
            (
                "fetch_markets",
                "{base}/predict/markets?token={token}&interval=60&from_date=2025-04-04%2007:55:30&to_date=2025-04-24%2013:25:30",
            ),
            (
                "fetch_forecasts",
                "{base}/predict/forecasts?token={token}&from_date=2025-03-24%2020:00:00&to_date=2025-03-27%2008:00:00&timeframe=15",
            ),
            ("fetch_accuracies", "{base}/predict/insights/accuracy?token={token}&to_date=2025-04-24"),
            ("fetch_correlations", "{base}/predict/insights/correlation?token={token}&to_date=2025-04-24"),
            ("fetch_sentiments", "{base}/predict/insights/sentiment?token={token}&to_date=2025-04-24"),
            ("fetch_owned_subscriptions", "{base}/subscriptions/owned"),
            ("fetch_subscription_plans", "{base}/subscriptions/plans?currency_id=USD"),
            (
                "fetch_subscription_instruments",
                "{base}/subscriptions/plans/instruments?subscription_plan_id=1",
            ),
            ("fetch_user_devices", "{base}/users/devices"),
            ("update_last_login", "{base}/users/devices/update-last-login"),
            ("fetch_user_profile", "{base}/users/get-profile"),
            ("fetch_referral_info", "{base}/users/referral-info"),
        ];

        Self {
            descriptors: entries
                .iter()
                .map(|(name, template)| EndpointDescriptor::new(*name, *template, 200))
                .collect(),
        }
    }
}
