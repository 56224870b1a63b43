use crate::types::grid::GridDataset;
use crate::types::series::MetadataSeries;
use crate::units::error::UnitError;
use crate::units::unit::{TimeBase, Unit};
use chrono::NaiveDateTime;
use log::info;
use ndarray::Axis;

/// Multipliers taking values from one unit to another.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionFactors {
    /// One factor for every timestamp.
    Uniform(f64),
    /// One factor per timestamp, for calendar-month rates.
    PerTimestamp(Vec<f64>),
}

impl ConversionFactors {
    /// Factor for the `index`-th timestamp.
    pub fn at(&self, index: usize) -> f64 {
        match self {
            ConversionFactors::Uniform(factor) => *factor,
            ConversionFactors::PerTimestamp(factors) => factors[index],
        }
    }
}

/// Computes the factors converting values in `from` to `to` at each of `times`.
///
/// Rates convert through their time base: `numerator × to_seconds / from_seconds`. When
/// both sides share a time base the seconds cancel, so `mm/month → in/month` is a single
/// factor and `mm/month → mm/month` is exactly `1.0`. A calendar month facing a fixed
/// duration takes the day count of each timestamp's own month.
pub fn conversion_factors(
    from: &Unit,
    to: &Unit,
    times: &[NaiveDateTime],
) -> Result<ConversionFactors, UnitError> {
    if from.is_equivalent(to) {
        return Ok(ConversionFactors::Uniform(1.0));
    }
    let numerator = from.numerator_factor_to(to)?;
    match (from.denominator(), to.denominator()) {
        (Some(_), None) => Err(UnitError::RateToNonRate {
            from: from.expression().to_string(),
            to: to.expression().to_string(),
        }),
        (None, Some(_)) => Err(UnitError::NonRateToRate {
            from: from.expression().to_string(),
            to: to.expression().to_string(),
        }),
        (None, None) => Ok(ConversionFactors::Uniform(numerator)),
        (Some(a), Some(b)) if a == b => Ok(ConversionFactors::Uniform(numerator)),
        (Some(TimeBase::Fixed(a)), Some(TimeBase::Fixed(b))) => {
            Ok(ConversionFactors::Uniform(numerator * b / a))
        }
        (Some(a), Some(b)) => times
            .iter()
            .map(|t| -> Result<f64, UnitError> {
                Ok(numerator * b.seconds_at(t)? / a.seconds_at(t)?)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ConversionFactors::PerTimestamp),
    }
}

/// Rescales a series to `target` and relabels it.
///
/// Nothing is touched when the conversion fails, so values and unit never disagree.
///
/// # Errors
///
/// Returns [`UnitError::RateToNonRate`] or [`UnitError::NonRateToRate`] when exactly one
/// side is a rate, [`UnitError::DimensionMismatch`] when the quantities differ, and a
/// parse error if either unit cannot be read.
pub fn convert_series_units(series: &mut MetadataSeries, target: &str) -> Result<(), UnitError> {
    let to = Unit::parse(target)?;
    let factors = conversion_factors(&series.unit, &to, &series.times)?;
    info!(
        "Converting {} {} from {} to {}",
        series.product_name(),
        series.variable_name(),
        series.unit,
        to
    );
    for (index, value) in series.values.iter_mut().enumerate() {
        *value *= factors.at(index);
    }
    series.unit = to;
    Ok(())
}

/// Converts every series to `target`, checking all of them before changing any.
pub fn convert_all_series(series: &mut [MetadataSeries], target: &str) -> Result<(), UnitError> {
    let to = Unit::parse(target)?;
    let plans = series
        .iter()
        .map(|s| conversion_factors(&s.unit, &to, &s.times))
        .collect::<Result<Vec<_>, _>>()?;
    for (s, factors) in series.iter_mut().zip(plans) {
        for (index, value) in s.values.iter_mut().enumerate() {
            *value *= factors.at(index);
        }
        s.unit = to.clone();
    }
    Ok(())
}

/// Converts the listed grid variables to `target`, rescaling each time layer and setting
/// their `units` attribute.
///
/// Every variable's conversion is planned first; if any of them fails nothing changes.
pub fn convert_grid_units(
    dataset: &mut GridDataset,
    target: &str,
    variables: &[&str],
) -> Result<(), UnitError> {
    let to = Unit::parse(target)?;
    let mut plans = Vec::with_capacity(variables.len());
    for name in variables {
        let from = Unit::parse(&dataset.variable(name)?.units)?;
        plans.push((*name, conversion_factors(&from, &to, dataset.times())?));
    }

    let product = dataset.product_name().to_string();
    for (name, factors) in plans {
        let variable = dataset.variable_mut(name)?;
        info!(
            "Converted {} {} from {} to {}",
            product, name, variable.units, target
        );
        match factors {
            ConversionFactors::Uniform(factor) => variable.values.mapv_inplace(|v| v * factor),
            ConversionFactors::PerTimestamp(factors) => {
                for (mut layer, factor) in variable.values.axis_iter_mut(Axis(0)).zip(factors) {
                    layer.mapv_inplace(|v| v * factor);
                }
            }
        }
        variable.units = to.expression().to_string();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::grid::monthly_times;
    use crate::types::variable_class::VariableClass;
    use ndarray::array;

    fn series(unit: &str, times: Vec<NaiveDateTime>, values: Vec<f64>) -> MetadataSeries {
        MetadataSeries::new(
            times,
            values,
            Unit::parse(unit).unwrap(),
            Some(VariableClass::Inflow),
            "NWM",
            "inflow",
        )
        .unwrap()
    }

    #[test]
    fn test_leap_february_uses_true_day_count() -> Result<(), UnitError> {
        let leap = monthly_times(2020, 2, 1);
        let common = monthly_times(2021, 2, 1);
        let from = Unit::parse("m3/s")?;
        let to = Unit::parse("m3/month")?;

        let leap_factor = conversion_factors(&from, &to, &leap)?.at(0);
        let common_factor = conversion_factors(&from, &to, &common)?.at(0);
        assert_eq!(leap_factor, 29.0 * 86_400.0);
        assert_eq!(common_factor, 28.0 * 86_400.0);
        assert_ne!(leap_factor, common_factor);
        Ok(())
    }

    #[test]
    fn test_same_month_unit_is_exact_noop() -> Result<(), UnitError> {
        let values = vec![0.1, 1.0 / 3.0, 123.456_789];
        let mut s = series("mm/month", monthly_times(2019, 12, 3), values.clone());
        convert_series_units(&mut s, "mm/month")?;
        assert_eq!(s.values(), values.as_slice());

        // Spelled differently, same unit.
        convert_series_units(&mut s, "mm month-1")?;
        assert_eq!(s.values(), values.as_slice());
        assert_eq!(s.unit().expression(), "mm month-1");
        Ok(())
    }

    #[test]
    fn test_month_round_trip_through_other_depth() -> Result<(), UnitError> {
        let values = vec![12.0, 30.5, 0.25];
        let mut s = series("mm/month", monthly_times(2020, 1, 3), values.clone());
        convert_series_units(&mut s, "in/month")?;
        assert!((s.values()[0] - 12.0 / 25.4).abs() < 1e-12);
        convert_series_units(&mut s, "mm/month")?;
        for (converted, original) in s.values().iter().zip(&values) {
            assert!((converted - original).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_month_to_day_uses_each_months_length() -> Result<(), UnitError> {
        let mut s = series("mm/month", monthly_times(2020, 1, 2), vec![31.0, 29.0]);
        convert_series_units(&mut s, "mm/day")?;
        assert!((s.values()[0] - 1.0).abs() < 1e-12);
        assert!((s.values()[1] - 1.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_rate_mismatch_fails_without_touching_values() {
        let mut s = series("mm/month", monthly_times(2020, 1, 1), vec![5.0]);
        let err = convert_series_units(&mut s, "mm").unwrap_err();
        assert!(matches!(err, UnitError::RateToNonRate { .. }));
        assert!(err.is_rate_mismatch());
        assert_eq!(s.values(), &[5.0]);
        assert_eq!(s.unit().expression(), "mm/month");

        let mut s = series("mm", monthly_times(2020, 1, 1), vec![5.0]);
        assert!(matches!(
            convert_series_units(&mut s, "mm/day"),
            Err(UnitError::NonRateToRate { .. })
        ));

        let mut s = series("mm/day", monthly_times(2020, 1, 1), vec![5.0]);
        assert!(matches!(
            convert_series_units(&mut s, "m3/day"),
            Err(UnitError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_convert_all_series_is_all_or_nothing() {
        let mut batch = vec![
            series("mm/month", monthly_times(2020, 1, 1), vec![1.0]),
            series("m3/s", monthly_times(2020, 1, 1), vec![1.0]),
        ];
        assert!(convert_all_series(&mut batch, "m/month").is_err());
        assert_eq!(batch[0].values(), &[1.0]);
        assert_eq!(batch[0].unit().expression(), "mm/month");
    }

    #[test]
    fn test_convert_grid_per_time_layer() -> Result<(), Box<dyn std::error::Error>> {
        let mut dataset = GridDataset::new(
            "ERA5_Land",
            monthly_times(2021, 1, 2),
            vec![0.0],
            vec![0.0, 1.0],
        )
        .with_variable("tp", "m/day", array![[[0.001, 0.002]], [[0.001, 0.0]]])?;
        convert_grid_units(&mut dataset, "mm/month", &["tp"])?;

        let tp = dataset.variable("tp")?;
        assert_eq!(tp.units, "mm/month");
        assert!((tp.values[[0, 0, 0]] - 31.0).abs() < 1e-9);
        assert!((tp.values[[0, 0, 1]] - 62.0).abs() < 1e-9);
        assert!((tp.values[[1, 0, 0]] - 28.0).abs() < 1e-9);

        assert!(matches!(
            convert_grid_units(&mut dataset, "mm", &["tp"]),
            Err(UnitError::RateToNonRate { .. })
        ));
        assert!(convert_grid_units(&mut dataset, "mm/month", &["e"]).is_err());
        Ok(())
    }
}
