use super::entities::Bar;
use crate::domain::errors::{ChartError, ChartResult};

/// Domain service validating bars before they enter a series
#[derive(Debug, Clone, Copy, Default)]
pub struct DataValidationService;

impl DataValidationService {
    pub fn new() -> Self {
        Self
    }

    /// Validate a single bar with a descriptive error.
    pub fn validate_bar(&self, bar: &Bar) -> ChartResult<()> {
        let ohlcv = &bar.ohlcv;
        let fields = [
            ("open", ohlcv.open.value()),
            ("high", ohlcv.high.value()),
            ("low", ohlcv.low.value()),
            ("close", ohlcv.close.value()),
            ("volume", ohlcv.volume.value()),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ChartError::InvalidInput(format!("{name} is not finite: {value}")));
        }

        if ohlcv.high.value() < ohlcv.low.value() {
            return Err(ChartError::InvalidInput("High price cannot be lower than low price".into()));
        }
        if ohlcv.high.value() < ohlcv.open.value().max(ohlcv.close.value()) {
            return Err(ChartError::InvalidInput("High price below candle body".into()));
        }
        if ohlcv.low.value() > ohlcv.open.value().min(ohlcv.close.value()) {
            return Err(ChartError::InvalidInput("Low price above candle body".into()));
        }
        if ohlcv.volume.value() < 0.0 {
            return Err(ChartError::InvalidInput("Volume cannot be negative".into()));
        }
        if bar.close_time <= bar.open_time {
            return Err(ChartError::InvalidInput(format!(
                "close time {} not after open time {}",
                bar.close_time, bar.open_time
            )));
        }

        Ok(())
    }

    /// Validate a historical batch: each bar valid, open times strictly ascending.
    pub fn validate_bar_sequence(&self, bars: &[Bar]) -> ChartResult<()> {
        for (i, bar) in bars.iter().enumerate() {
            self.validate_bar(bar)
                .map_err(|e| ChartError::InvalidInput(format!("bar {i}: {e}")))?;
        }

        if let Some(i) = bars.windows(2).position(|pair| pair[1].open_time <= pair[0].open_time) {
            let (prev, current) = (&bars[i], &bars[i + 1]);
            let problem = if current.open_time == prev.open_time { "duplicate" } else { "out-of-order" };
            return Err(ChartError::InvalidInput(format!(
                "{problem} open time {} at index {}",
                current.open_time,
                i + 1
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::{OHLCV, Price, Timestamp, Volume};

    fn bar(open: u64, close: u64, low: f64, high: f64) -> Bar {
        Bar::new(
            Timestamp::from_millis(open),
            Timestamp::from_millis(close),
            OHLCV::new(Price::new(10.0), Price::new(high), Price::new(low), Price::new(10.0), Volume::new(1.0)),
        )
    }

    #[test]
    fn accepts_well_formed_sequence() {
        let svc = DataValidationService::new();
        let bars = vec![bar(0, 59, 9.0, 11.0), bar(60, 119, 9.0, 11.0)];
        assert!(svc.validate_bar_sequence(&bars).is_ok());
        assert!(svc.validate_bar_sequence(&[]).is_ok());
    }

    #[test]
    fn rejects_out_of_order_batch() {
        let svc = DataValidationService::new();
        let bars = vec![bar(60, 119, 9.0, 11.0), bar(0, 59, 9.0, 11.0)];
        let err = svc.validate_bar_sequence(&bars).unwrap_err();
        assert!(err.to_string().contains("out-of-order"));
    }

    #[test]
    fn rejects_inverted_wicks_and_times() {
        let svc = DataValidationService::new();
        assert!(svc.validate_bar(&bar(0, 59, 12.0, 11.0)).is_err());
        assert!(svc.validate_bar(&bar(60, 60, 9.0, 11.0)).is_err());
        assert!(svc.validate_bar(&bar(0, 59, 9.0, f64::INFINITY)).is_err());
    }
}
