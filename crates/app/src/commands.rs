use std::{collections::BTreeSet, path::PathBuf};

use api_types::transaction::{RecordId, RecordStatus};
use chrono::NaiveDate;
use engine::{FlagFilter, SortDirection, SortField};

/// One line of input, parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Show,
    Help,
    Quit,
    Refresh,
    Facets,
    NextPage,
    PrevPage,
    Page(usize),
    PageSize(usize),
    Sort(SortField, Option<SortDirection>),
    Filter(FilterEdit),
    ClearFilters,
    Select { id: RecordId, range: bool },
    SelectPage,
    ClearSelection,
    Delete(RecordId),
    Undo,
    Set(FormEdit),
    ResetForm,
    Apply,
    Import {
        path: PathBuf,
        bank: Option<String>,
        origin: Option<String>,
    },
}

/// A change to one filter control. `None` values clear the control.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FilterEdit {
    Status(Option<RecordStatus>),
    MajorCategory(Option<String>),
    Category(Option<String>),
    Origin(Option<String>),
    Bank(Option<String>),
    Flagged(FlagFilter),
    Tag(String),
    Search(Option<String>),
    From(Option<NaiveDate>),
    To(Option<NaiveDate>),
}

/// A change to one bulk edit form field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FormEdit {
    Status(RecordStatus),
    Flagged(bool),
    MajorCategory(String),
    Category(String),
    Tags(BTreeSet<String>),
    Notes(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub(crate) enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("unknown command `{0}`, try `help`")]
    UnknownCommand(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid value `{value}` for {what}")]
    InvalidValue { what: &'static str, value: String },
}

pub(crate) const HELP: &str = "\
commands:
  ls                          show the current page
  next | prev | page N        move between pages
  size N                      set the page size
  sort FIELD [asc|desc]       date, amount, description, origin, bank
  filter KEY [VALUE]          status, major, category, origin, bank, flagged,
                              tag, search, from, to (no value clears it)
  clear                       clear all filters
  select ID | range ID        toggle a row, or extend from the last one
  page-all                    toggle every row on the page
  deselect                    clear the selection
  delete ID | undo            delete with an undo window
  set FIELD VALUE             bulk form: status, flagged, major, category,
                              tags (comma separated), notes
  reset-form | apply          clear or apply the bulk form to the selection
  import PATH [BANK [ORIGIN]] send a statement file to the store
  facets | refresh | quit";

pub(crate) fn parse_command(input: &str) -> Result<Command, ParseError> {
    let trimmed = input.trim();
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };
    if head.is_empty() {
        return Err(ParseError::Empty);
    }

    let command = match head.to_ascii_lowercase().as_str() {
        "ls" | "show" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        "refresh" => Command::Refresh,
        "facets" => Command::Facets,
        "next" | "n" => Command::NextPage,
        "prev" | "p" => Command::PrevPage,
        "page" => Command::Page(parse_number("page", required("page", rest)?)?),
        "size" => Command::PageSize(parse_number("size", required("size", rest)?)?),
        "sort" => parse_sort(rest)?,
        "filter" => Command::Filter(parse_filter(rest)?),
        "clear" => Command::ClearFilters,
        "select" => Command::Select {
            id: required("select", rest)?.into(),
            range: false,
        },
        "range" => Command::Select {
            id: required("range", rest)?.into(),
            range: true,
        },
        "page-all" => Command::SelectPage,
        "deselect" => Command::ClearSelection,
        "delete" | "rm" => Command::Delete(required("delete", rest)?.into()),
        "undo" | "u" => Command::Undo,
        "set" => Command::Set(parse_form_edit(rest)?),
        "reset-form" => Command::ResetForm,
        "apply" => Command::Apply,
        "import" => parse_import(rest)?,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(command)
}

fn required<'a>(command: &'static str, rest: &'a str) -> Result<&'a str, ParseError> {
    if rest.is_empty() {
        return Err(ParseError::MissingArgument(command));
    }
    Ok(rest)
}

fn optional(rest: &str) -> Option<String> {
    (!rest.is_empty()).then(|| rest.to_string())
}

fn invalid(what: &'static str, value: &str) -> ParseError {
    ParseError::InvalidValue {
        what,
        value: value.to_string(),
    }
}

fn parse_number(what: &'static str, value: &str) -> Result<usize, ParseError> {
    value
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| invalid(what, value))
}

fn parse_status(value: &str) -> Result<RecordStatus, ParseError> {
    RecordStatus::try_from(value.to_ascii_lowercase().as_str()).map_err(|_| invalid("status", value))
}

fn parse_date(value: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid("date", value))
}

fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Ok(true),
        "no" | "false" | "off" | "0" => Ok(false),
        _ => Err(invalid("flag", value)),
    }
}

fn parse_sort(rest: &str) -> Result<Command, ParseError> {
    let mut parts = required("sort", rest)?.split_whitespace();
    let field = parts.next().unwrap_or_default();
    let field = SortField::try_from(field.to_ascii_lowercase().as_str())
        .map_err(|_| invalid("sort field", field))?;
    let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
        None => None,
        Some("asc") => Some(SortDirection::Asc),
        Some("desc") => Some(SortDirection::Desc),
        Some(other) => return Err(invalid("sort direction", other)),
    };
    Ok(Command::Sort(field, direction))
}

fn parse_filter(rest: &str) -> Result<FilterEdit, ParseError> {
    let (key, value) = match required("filter", rest)?.split_once(char::is_whitespace) {
        Some((key, value)) => (key, value.trim()),
        None => (rest, ""),
    };

    let edit = match key.to_ascii_lowercase().as_str() {
        "status" => FilterEdit::Status(optional(value).map(|v| parse_status(&v)).transpose()?),
        "major" => FilterEdit::MajorCategory(optional(value)),
        "category" => FilterEdit::Category(optional(value)),
        "origin" => FilterEdit::Origin(optional(value)),
        "bank" => FilterEdit::Bank(optional(value)),
        "flagged" => FilterEdit::Flagged(match value.to_ascii_lowercase().as_str() {
            "" | "any" => FlagFilter::Any,
            other => {
                if parse_bool(other)? {
                    FlagFilter::Flagged
                } else {
                    FlagFilter::Unflagged
                }
            }
        }),
        "tag" => FilterEdit::Tag(required("filter tag", value)?.to_string()),
        "search" => FilterEdit::Search(optional(value)),
        "from" => FilterEdit::From(optional(value).map(|v| parse_date(&v)).transpose()?),
        "to" => FilterEdit::To(optional(value).map(|v| parse_date(&v)).transpose()?),
        _ => return Err(invalid("filter", key)),
    };
    Ok(edit)
}

fn parse_form_edit(rest: &str) -> Result<FormEdit, ParseError> {
    let (field, value) = required("set", rest)?
        .split_once(char::is_whitespace)
        .map(|(field, value)| (field, value.trim()))
        .ok_or(ParseError::MissingArgument("set"))?;

    let edit = match field.to_ascii_lowercase().as_str() {
        "status" => FormEdit::Status(parse_status(value)?),
        "flagged" => FormEdit::Flagged(parse_bool(value)?),
        "major" => FormEdit::MajorCategory(value.to_string()),
        "category" => FormEdit::Category(value.to_string()),
        "tags" => FormEdit::Tags(
            value
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        "notes" => FormEdit::Notes(value.to_string()),
        _ => return Err(invalid("form field", field)),
    };
    Ok(edit)
}

fn parse_import(rest: &str) -> Result<Command, ParseError> {
    let mut parts = required("import", rest)?.split_whitespace();
    let path = parts.next().map(PathBuf::from).ok_or(ParseError::MissingArgument("import"))?;
    Ok(Command::Import {
        path,
        bank: parts.next().map(str::to_string),
        origin: parts.next().map(str::to_string),
    })
}
