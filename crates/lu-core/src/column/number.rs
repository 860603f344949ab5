//! Numeric leaf columns

use serde_json::Value;

use crate::desc::ColumnDesc;
use crate::filter::NumberFilter;
use crate::mapping::{MappingFunction, ScriptFn};
use crate::stats::{BoxPlotData, SortMethod};
use crate::value::{as_number, as_numbers, DataRow};

/// Number column: one or several raw numbers per row plus a mapping
#[derive(Debug, Clone)]
pub struct NumberColumn {
    mapping: MappingFunction,
    original_mapping: MappingFunction,
    filter: NumberFilter,
    sort_method: SortMethod,
}

impl NumberColumn {
    pub fn from_desc(desc: &ColumnDesc, scripts: &dyn Fn(&str) -> Option<ScriptFn>) -> Self {
        let mapping = MappingFunction::from_desc(desc, scripts);
        Self {
            original_mapping: mapping.clone(),
            mapping,
            filter: NumberFilter::default(),
            sort_method: desc.sort.unwrap_or_default(),
        }
    }

    /// All valid raw numbers of a row, array cells flattened
    pub fn raw_numbers(&self, desc: &ColumnDesc, row: &DataRow) -> Vec<f64> {
        as_numbers(field(desc, row))
    }

    /// The raw number used for comparison, reduced by the sort method for arrays
    pub fn raw_number(&self, desc: &ColumnDesc, row: &DataRow) -> f64 {
        match field(desc, row) {
            Some(Value::Array(_)) => self.sort_method.reduce(&self.raw_numbers(desc, row)),
            other => as_number(other),
        }
    }

    /// Normalized value in `[0, 1]`, NaN when missing
    pub fn number(&self, desc: &ColumnDesc, row: &DataRow) -> f64 {
        self.mapping.apply(self.raw_number(desc, row))
    }

    /// Normalized values of every number in the row
    pub fn numbers(&self, desc: &ColumnDesc, row: &DataRow) -> Vec<f64> {
        self.raw_numbers(desc, row)
            .into_iter()
            .map(|v| self.mapping.apply(v))
            .collect()
    }

    pub fn matches(&self, desc: &ColumnDesc, row: &DataRow) -> bool {
        self.filter.accepts(self.raw_number(desc, row))
    }

    pub fn mapping(&self) -> &MappingFunction {
        &self.mapping
    }

    /// Mapping declared by the descriptor, for resetting mapping editors
    pub fn original_mapping(&self) -> &MappingFunction {
        &self.original_mapping
    }

    pub(crate) fn set_mapping(&mut self, mapping: MappingFunction) -> bool {
        if self.mapping == mapping {
            return false;
        }
        self.mapping = mapping;
        true
    }

    pub fn filter(&self) -> &NumberFilter {
        &self.filter
    }

    pub(crate) fn set_filter(&mut self, filter: NumberFilter) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        true
    }

    pub fn sort_method(&self) -> SortMethod {
        self.sort_method
    }

    pub(crate) fn set_sort_method(&mut self, method: SortMethod) {
        self.sort_method = method;
    }
}

/// Box-plot column: a pre-computed five-number summary per row
#[derive(Debug, Clone)]
pub struct BoxPlotColumn {
    mapping: MappingFunction,
    original_mapping: MappingFunction,
    filter: NumberFilter,
    sort_method: SortMethod,
}

impl BoxPlotColumn {
    pub fn from_desc(desc: &ColumnDesc, scripts: &dyn Fn(&str) -> Option<ScriptFn>) -> Self {
        let mapping = MappingFunction::from_desc(desc, scripts);
        Self {
            original_mapping: mapping.clone(),
            mapping,
            filter: NumberFilter::default(),
            sort_method: desc.sort.unwrap_or_default(),
        }
    }

    /// Summary in raw units, `None` when the cell is missing or incomplete
    pub fn raw_box_plot(&self, desc: &ColumnDesc, row: &DataRow) -> Option<BoxPlotData> {
        let cell = field(desc, row)?;
        let get = |key: &str| as_number(cell.get(key));
        let (min, q1, median, q3, max) = (get("min"), get("q1"), get("median"), get("q3"), get("max"));
        if [min, q1, median, q3, max].iter().any(|v| v.is_nan()) {
            return None;
        }
        let mut data = BoxPlotData::from_quartiles(min, q1, median, q3, max);
        let mean = get("mean");
        if !mean.is_nan() {
            data.mean = mean;
        }
        data.outliers = as_numbers(cell.get("outliers"));
        data.outliers.sort_by(f64::total_cmp);
        Some(data)
    }

    /// Summary mapped into `[0, 1]` for geometry
    pub fn box_plot(&self, desc: &ColumnDesc, row: &DataRow) -> Option<BoxPlotData> {
        self.raw_box_plot(desc, row)
            .map(|data| data.map(|v| self.mapping.apply(v)))
    }

    /// The statistic selected by the sort method, in raw units
    pub fn raw_number(&self, desc: &ColumnDesc, row: &DataRow) -> f64 {
        self.raw_box_plot(desc, row)
            .map(|data| data.get(self.sort_method))
            .unwrap_or(f64::NAN)
    }

    pub fn number(&self, desc: &ColumnDesc, row: &DataRow) -> f64 {
        self.mapping.apply(self.raw_number(desc, row))
    }

    pub fn matches(&self, desc: &ColumnDesc, row: &DataRow) -> bool {
        self.filter.accepts(self.raw_number(desc, row))
    }

    pub fn mapping(&self) -> &MappingFunction {
        &self.mapping
    }

    pub fn original_mapping(&self) -> &MappingFunction {
        &self.original_mapping
    }

    pub(crate) fn set_mapping(&mut self, mapping: MappingFunction) -> bool {
        if self.mapping == mapping {
            return false;
        }
        self.mapping = mapping;
        true
    }

    pub fn filter(&self) -> &NumberFilter {
        &self.filter
    }

    pub(crate) fn set_filter(&mut self, filter: NumberFilter) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        true
    }

    pub fn sort_method(&self) -> SortMethod {
        self.sort_method
    }

    pub(crate) fn set_sort_method(&mut self, method: SortMethod) {
        self.sort_method = method;
    }
}

fn field<'a>(desc: &ColumnDesc, row: &DataRow<'a>) -> Option<&'a Value> {
    desc.column.as_deref().and_then(|f| row.field(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_scripts(_: &str) -> Option<ScriptFn> {
        None
    }

    #[test]
    fn test_number_values() {
        let desc = ColumnDesc::number("v").with_domain(0.0, 10.0);
        let col = NumberColumn::from_desc(&desc, &no_scripts);

        let row = json!({"v": 5});
        let r = DataRow::new(0, &row);
        assert_eq!(col.raw_number(&desc, &r), 5.0);
        assert_eq!(col.number(&desc, &r), 0.5);

        let missing = json!({"v": null});
        assert!(col.number(&desc, &DataRow::new(1, &missing)).is_nan());
    }

    #[test]
    fn test_number_array_reduction() {
        let mut desc = ColumnDesc::number("v").with_domain(0.0, 10.0);
        desc.sort = Some(SortMethod::Max);
        let col = NumberColumn::from_desc(&desc, &no_scripts);

        let row = json!({"v": [2, 8, 4]});
        let r = DataRow::new(0, &row);
        assert_eq!(col.raw_number(&desc, &r), 8.0);
        assert_eq!(col.numbers(&desc, &r), vec![0.2, 0.8, 0.4]);
    }

    #[test]
    fn test_box_plot_cells() {
        let desc = ColumnDesc::box_plot("b").with_domain(0.0, 100.0);
        let col = BoxPlotColumn::from_desc(&desc, &no_scripts);

        let row = json!({"b": {"min": 0, "q1": 20, "median": 50, "q3": 60, "max": 100}});
        let r = DataRow::new(0, &row);
        let raw = col.raw_box_plot(&desc, &r).unwrap();
        assert_eq!(raw.median, 50.0);
        assert_eq!(col.number(&desc, &r), 0.5);
        assert_eq!(col.box_plot(&desc, &r).unwrap().q3, 0.6);

        let partial = json!({"b": {"min": 0}});
        assert!(col.raw_box_plot(&desc, &DataRow::new(1, &partial)).is_none());
    }
}
