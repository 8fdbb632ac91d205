/// Arithmetic mean; an empty slice averages to 0.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Running sums and mean inputs for one rollup bucket.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    pub sessions: i64,
    pub pageviews: i64,
    pub active_users: i64,
    pub session_durations: Vec<f64>,
    pub engagement_rates: Vec<f64>,
    pub bounce_rates: Vec<f64>,
}

impl Accumulator {
    pub fn push(
        &mut self,
        sessions: i64,
        pageviews: i64,
        active_users: i64,
        session_duration: f64,
        engagement_rate: f64,
        bounce_rate: f64,
    ) {
        self.sessions += sessions;
        self.pageviews += pageviews;
        self.active_users += active_users;
        self.session_durations.push(session_duration);
        self.engagement_rates.push(engagement_rate);
        self.bounce_rates.push(bounce_rate);
    }

    pub fn len(&self) -> usize {
        self.session_durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.session_durations.is_empty()
    }

    pub fn mean_session_duration(&self) -> f64 {
        mean(&self.session_durations)
    }

    pub fn mean_engagement_rate(&self) -> f64 {
        mean(&self.engagement_rates)
    }

    pub fn mean_bounce_rate(&self) -> f64 {
        mean(&self.bounce_rates)
    }
}
