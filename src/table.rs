//! Shared `prettytable` styling for everything the machine prints as a table.

use std::fmt::Display;

use prettytable::{format as TableFormat, Table};

lazy_static! {
  pub static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

/// A two column table of `name[i] = value` rows, with an arrow on the `highlight` row.
pub fn make_register_table<T>(name: &str, registers: &[T], highlight: Option<usize>) -> Table
  where T: Display
{
  let mut table = Table::new();

  table.set_format(*TABLE_DISPLAY_FORMAT);
  table.set_titles(row![ubr->"Register", ubl->"Contents"]);

  for (i, value) in registers.iter().enumerate() {
    match Some(i) == highlight {

      true  => {
        table.add_row(
          row![r->format!("* --> {}{} =", name, i), format!("{}", value)]
        );
      }

      false => {
        table.add_row(
          row![r->format!("{}{} =", name, i), format!("{}", value)]
        );
      }

    } // end match on highlight
  } // end for
  table
}
