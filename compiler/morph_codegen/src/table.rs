//! Table expansion: per-row data sources lowered into switch ops.
//!
//! Every domain funnels its table kind through [`CodeGenerator::expand_table`],
//! supplying a closure that materializes one row's cell. The row selector
//! is one shared enumeration parameter per (table, parameter name) pair,
//! memoized independently of which column or domain is expanding, so a
//! mesh column and a color column of the same table drive off the same
//! runtime parameter.

use std::sync::Arc;

use morph_graph::{CellValue, ColumnType, TableNode};
use morph_ir::{EnumOption, ScalarOpRef, Switch, SwitchCase};

use crate::options::GenerationOptions;
use crate::params;
use crate::scalar::case_value;
use crate::CodeGenerator;

impl CodeGenerator {
    /// The shared row-selector parameter for a (table, parameter name)
    /// pair.
    pub(crate) fn table_selector(&self, table_ref: &TableNode) -> ScalarOpRef {
        let key = (
            Arc::as_ptr(&table_ref.table) as usize,
            table_ref.parameter_name.clone(),
        );
        if let Some(hit) = self.caches.table_selectors.get(&key) {
            return hit;
        }

        let table = &table_ref.table;
        let name = if table_ref.parameter_name.is_empty() {
            table.name()
        } else {
            &table_ref.parameter_name
        };

        // A string column, when present, names the options.
        let name_column = table.find_name_column();
        let mut options = Vec::with_capacity(table.row_count() + 1);
        if table_ref.add_none_option {
            options.push(EnumOption {
                value: -1,
                name: "None".to_owned(),
            });
        }
        let mut default = if table_ref.add_none_option { -1 } else { 0 };
        for (row, _) in table.rows().iter().enumerate() {
            let row_name = name_column
                .map(|column| match table.cell(row, column) {
                    CellValue::String(value) => value.clone(),
                    _ => String::new(),
                })
                .unwrap_or_default();
            let value = case_value(row);
            if !table_ref.default_row_name.is_empty() && row_name == table_ref.default_row_name {
                default = value;
            }
            options.push(EnumOption {
                value,
                name: row_name,
            });
        }

        let selector = params::synthesized_enum_parameter(name, default, options);
        self.caches.table_selectors.insert_shared(key, selector)
    }

    /// Expand a table reference into a switch with one branch per row.
    ///
    /// Validation failures (no rows, unknown column, wrong column type)
    /// report one error each and return `None`; the calling domain
    /// substitutes its own placeholder. `include_empty_branches` keeps a
    /// branch with an empty arm when the materializer yields nothing —
    /// the mesh domain wants that (absent cells are legal rows), every
    /// other domain skips the branch instead. The asymmetry is
    /// deliberate.
    pub(crate) fn expand_table<T>(
        &self,
        _options: &GenerationOptions,
        table_ref: &TableNode,
        expected: ColumnType,
        include_empty_branches: bool,
        mut materialize: impl FnMut(&CellValue, usize) -> Option<Arc<T>>,
    ) -> Option<Switch<T>> {
        let table = &table_ref.table;
        if table.row_count() == 0 {
            self.sink.error(
                format!("table `{}` has no rows", table.name()),
                table_ref.context.clone(),
            );
            return None;
        }
        let Some(column) = table.find_column(&table_ref.column) else {
            self.sink.error(
                format!(
                    "table `{}` has no column named `{}`",
                    table.name(),
                    table_ref.column
                ),
                table_ref.context.clone(),
            );
            return None;
        };
        let declared = table.columns()[column].ty;
        if declared != expected {
            self.sink.error(
                format!(
                    "column `{}` of table `{}` holds {declared:?} values, expected {expected:?}",
                    table_ref.column,
                    table.name()
                ),
                table_ref.context.clone(),
            );
            return None;
        }

        let selector = self.table_selector(table_ref);
        let mut cases = Vec::with_capacity(table.row_count());
        for row in 0..table.row_count() {
            match materialize(table.cell(row, column), row) {
                Some(op) => cases.push(SwitchCase::new(case_value(row), Some(op))),
                None if include_empty_branches => {
                    cases.push(SwitchCase::new(case_value(row), None));
                }
                None => {}
            }
        }

        Some(Switch {
            selector,
            cases,
            default: None,
        })
    }
}
