use crate::downloader::{FlatFileLayout, OutputFormat, SheetLayout};
use crate::entity::LevelKind;
use crate::error::ReportError;
use crate::hierarchy::HierarchyIndex;
use crate::selection::{ReportLevels, SelectionState};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which attribute of the selected entity goes into the request body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Id,
    Label,
}

/// What an unset filter is sent as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlankValue {
    EmptyString,
    Null,
}

impl BlankValue {
    fn to_value(self) -> Value {
        match self {
            BlankValue::EmptyString => Value::String(String::new()),
            BlankValue::Null => Value::Null,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelField {
    pub level: LevelKind,
    pub name: String,
    pub value: FieldValue,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusField {
    /// One status, sent by id.
    Single(String),
    /// Any number of statuses, sent as an array of labels.
    Multi(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFields {
    pub start: String,
    pub end: String,
    /// Wrap both dates in an object under this name, e.g. `appDate: { start, end }`.
    pub nested: Option<String>,
    pub required: bool,
    /// When false a range may leave its start open; the start is then sent blank.
    pub start_required: bool,
}

/// A closed or start-open date range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if start > end {
            return Err(ReportError::InvalidDateRange {
                start: start.format("%Y-%m-%d").to_string(),
                end: end.format("%Y-%m-%d").to_string(),
            });
        }
        Ok(DateRange {
            start: Some(start),
            end,
        })
    }

    pub fn until(end: NaiveDate) -> Self {
        DateRange { start: None, end }
    }

    /// Parse `YYYY-MM-DD` dates. A blank `start` gives a start-open range.
    pub fn parse(start: &str, end: &str) -> Result<Self, ReportError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| ReportError::UnexpectedShape(format!("'{}' is not a YYYY-MM-DD date", s)))
        };
        if start.trim().is_empty() {
            return Ok(Self::until(parse(end)?));
        }
        Self::new(parse(start)?, parse(end)?)
    }
}

/// Body key naming the bureau a flat file is generated for.
pub const REPORT_TYPE_FIELD: &str = "reportType";

/// Bureaus the regulatory flat file can be generated for.
pub const BUREAU_REPORT_TYPES: [&str; 3] = ["Equifax", "CRIF", "Experian"];

/// Filters that sit outside the location hierarchy.
#[derive(Clone, Debug, Default)]
pub struct ReportFilters {
    pub statuses: Vec<String>,
    pub date_range: Option<DateRange>,
    pub extra: Map<String, Value>,
}

/// Everything that differs between report forms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportProfile {
    pub name: String,
    pub cache_key: String,
    pub dropdown_path: Option<String>,
    pub generate_path: String,
    /// Sent as `?reportType=` on the dropdown request when set.
    pub report_type: Option<String>,
    pub levels: ReportLevels,
    pub fields: Vec<LevelField>,
    pub required: Vec<LevelKind>,
    /// Keys of `ReportFilters::extra` that must hold a non-blank value.
    pub required_extra: Vec<String>,
    pub status_field: Option<StatusField>,
    pub date_fields: Option<DateFields>,
    pub blank: BlankValue,
    pub output: OutputFormat,
}

impl ReportProfile {
    /// Build the POST body for report generation.
    ///
    /// Each configured level field carries the selected entity's id or label, or the
    /// profile's blank sentinel when nothing is selected at that level.
    pub fn request_body(
        &self,
        index: &HierarchyIndex,
        selection: &SelectionState,
        filters: &ReportFilters,
    ) -> Result<Value, ReportError> {
        for level in &self.required {
            if selection.get(*level).is_none() {
                return Err(ReportError::MissingField(level.to_string()));
            }
        }
        for key in &self.required_extra {
            if filters.extra.get(key).map_or(true, is_blank) {
                return Err(ReportError::MissingField(key.clone()));
            }
        }

        let mut body = Map::new();

        for field in &self.fields {
            let value = match selection.get(field.level) {
                None => self.blank.to_value(),
                Some(id) => {
                    let entity = index.get(id).ok_or_else(|| ReportError::StaleSelection {
                        level: field.level,
                        id: id.to_string(),
                    })?;
                    match field.value {
                        FieldValue::Id => Value::String(entity.id.clone()),
                        FieldValue::Label => Value::String(entity.label.clone()),
                    }
                }
            };
            body.insert(field.name.clone(), value);
        }

        match &self.status_field {
            Some(StatusField::Single(name)) => {
                let value = filters
                    .statuses
                    .first()
                    .map(|s| Value::String(s.clone()))
                    .unwrap_or_else(|| self.blank.to_value());
                body.insert(name.clone(), value);
            }
            Some(StatusField::Multi(name)) => {
                let labels = filters
                    .statuses
                    .iter()
                    .map(|s| {
                        let label = index
                            .statuses()
                            .iter()
                            .find(|o| &o.id == s)
                            .map(|o| o.label.clone())
                            .unwrap_or_else(|| s.clone());
                        Value::String(label)
                    })
                    .collect();
                body.insert(name.clone(), Value::Array(labels));
            }
            None => {}
        }

        if let Some(dates) = &self.date_fields {
            match filters.date_range {
                Some(range) => {
                    let start = match range.start {
                        Some(start) => format_date(start),
                        None if dates.start_required => {
                            return Err(ReportError::MissingField("start date".to_string()));
                        }
                        None => self.blank.to_value(),
                    };
                    let mut pair = Map::new();
                    pair.insert(dates.start.clone(), start);
                    pair.insert(dates.end.clone(), format_date(range.end));
                    match &dates.nested {
                        Some(wrapper) => {
                            body.insert(wrapper.clone(), Value::Object(pair));
                        }
                        None => body.extend(pair),
                    }
                }
                None if dates.required => {
                    return Err(ReportError::MissingField("date range".to_string()));
                }
                None => {}
            }
        }

        for (key, value) in &filters.extra {
            body.insert(key.clone(), value.clone());
        }

        Ok(Value::Object(body))
    }

    pub fn download_name(&self) -> String {
        self.output.file_name(&self.name)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn format_date(date: NaiveDate) -> Value {
    Value::String(date.format("%Y-%m-%d").to_string())
}

fn field(level: LevelKind, name: &str, value: FieldValue) -> LevelField {
    LevelField {
        level,
        name: name.to_string(),
        value,
    }
}

fn sheet(name: &str) -> OutputFormat {
    OutputFormat::Xlsx(SheetLayout::named(name))
}

/// Profiles for the report forms of the console.
pub fn builtin_profiles() -> Vec<ReportProfile> {
    use FieldValue::{Id, Label};
    use LevelKind::{Area, Branch, Cluster, Region};

    vec![
        ReportProfile {
            name: "death".to_string(),
            cache_key: "deathReportDropdownData".to_string(),
            dropdown_path: Some("/api/dropdown-data-deathreport".to_string()),
            generate_path: "/generate-deathreport".to_string(),
            report_type: None,
            levels: ReportLevels::new([Cluster, Region, Branch]),
            fields: vec![
                field(Cluster, "Cluster", Label),
                field(Region, "Region", Label),
                field(Branch, "Branch", Id),
            ],
            required: vec![],
            required_extra: vec![],
            status_field: None,
            date_fields: None,
            blank: BlankValue::EmptyString,
            output: sheet("DeathReport"),
        },
        ReportProfile {
            name: "employee-master".to_string(),
            cache_key: "employeeMasterDropdownData".to_string(),
            dropdown_path: Some("/api/employeemaster/dropdown-data".to_string()),
            generate_path: "/api/employeemaster/generate".to_string(),
            report_type: None,
            levels: ReportLevels::full(),
            fields: vec![
                field(Branch, "branchID", Label),
                field(Area, "areaID", Label),
                field(Region, "regionID", Label),
                field(Cluster, "clusterID", Label),
            ],
            required: vec![],
            required_extra: vec![],
            status_field: Some(StatusField::Multi("employeeStatus".to_string())),
            date_fields: None,
            blank: BlankValue::Null,
            output: sheet("EmployeeMasterReport"),
        },
        ReportProfile {
            name: "foreclosure".to_string(),
            cache_key: "ForeClosureDropdownData".to_string(),
            dropdown_path: Some("/api/foreclosure/get-foreclosure-dropdowns".to_string()),
            generate_path: "/api/foreclosure/generate".to_string(),
            report_type: None,
            levels: ReportLevels::new([Region, Branch]),
            fields: vec![
                field(Branch, "branchName", Label),
                field(Region, "regionName", Label),
            ],
            required: vec![],
            required_extra: vec![],
            status_field: None,
            date_fields: None,
            blank: BlankValue::EmptyString,
            output: sheet("ForeClosureReport"),
        },
        ReportProfile {
            name: "credit".to_string(),
            cache_key: "creditReportDropdownData".to_string(),
            dropdown_path: Some("/api/dropdown-data-creditreport".to_string()),
            generate_path: "/generate-creditreport".to_string(),
            report_type: None,
            levels: ReportLevels::new([Branch]),
            fields: vec![field(Branch, "branchID", Id)],
            required: vec![Branch],
            required_extra: vec![],
            status_field: Some(StatusField::Single("creditAppStatus".to_string())),
            date_fields: Some(DateFields {
                start: "startDate".to_string(),
                end: "endDate".to_string(),
                nested: None,
                required: true,
                start_required: true,
            }),
            blank: BlankValue::EmptyString,
            output: sheet("CreditReport"),
        },
        ReportProfile {
            name: "borrower-master".to_string(),
            cache_key: "borrowerMasterDropdowns".to_string(),
            dropdown_path: Some("/api/dropdown-data-borrowermaster".to_string()),
            generate_path: "/generate-borrowermaster-report".to_string(),
            report_type: None,
            levels: ReportLevels::new([Branch]),
            fields: vec![field(Branch, "branchName", Label), field(Branch, "branchId", Id)],
            required: vec![Branch],
            required_extra: vec![],
            status_field: None,
            date_fields: None,
            blank: BlankValue::EmptyString,
            output: sheet("BorrowerMasterReport"),
        },
        ReportProfile {
            name: "loan-application".to_string(),
            cache_key: "dropdownDataCache".to_string(),
            dropdown_path: Some("/api/dropdown-data-loanapplication".to_string()),
            generate_path: "/generate-loanapplication-report".to_string(),
            report_type: None,
            levels: ReportLevels::new([Branch]),
            fields: vec![field(Branch, "branchName", Label)],
            required: vec![Branch],
            required_extra: vec![],
            status_field: Some(StatusField::Single("appStatus".to_string())),
            date_fields: Some(DateFields {
                start: "start".to_string(),
                end: "end".to_string(),
                nested: Some("appDate".to_string()),
                required: true,
                start_required: true,
            }),
            blank: BlankValue::EmptyString,
            output: OutputFormat::Xlsx(SheetLayout {
                skip_columns: 1,
                ..SheetLayout::named("LoanApplicationReport")
            }),
        },
        ReportProfile {
            name: "loan-details".to_string(),
            cache_key: "loanDetailsDropdownData".to_string(),
            dropdown_path: Some("/api/dropdown-data-loan".to_string()),
            generate_path: "/generate-loan-details-report".to_string(),
            report_type: None,
            levels: ReportLevels::new([Cluster, Region, Branch]),
            fields: vec![
                field(Cluster, "clusterName", Label),
                field(Region, "regionName", Label),
                field(Branch, "branchName", Label),
            ],
            required: vec![Branch],
            required_extra: vec![],
            status_field: None,
            date_fields: None,
            blank: BlankValue::EmptyString,
            output: OutputFormat::Xlsx(SheetLayout {
                include_header: false,
                ..SheetLayout::named("LoanDetails")
            }),
        },
        ReportProfile {
            name: "luc".to_string(),
            cache_key: "lucDropdownData".to_string(),
            dropdown_path: Some("/api/dropdown-data-LUC".to_string()),
            generate_path: "/generate-luc-details-report".to_string(),
            report_type: None,
            levels: ReportLevels::new([Cluster, Region, Branch]),
            fields: vec![
                field(Cluster, "clusterName", Label),
                field(Region, "regionName", Label),
                field(Branch, "branchName", Label),
            ],
            required: vec![Branch],
            required_extra: vec![],
            status_field: None,
            date_fields: None,
            blank: BlankValue::EmptyString,
            output: OutputFormat::Xlsx(SheetLayout {
                include_header: false,
                ..SheetLayout::named("Lucreport")
            }),
        },
        ReportProfile {
            name: "regulatory".to_string(),
            cache_key: "regulatoryReport".to_string(),
            dropdown_path: None,
            generate_path: "/generate-report".to_string(),
            report_type: None,
            levels: ReportLevels::none(),
            fields: vec![],
            required: vec![],
            required_extra: vec![REPORT_TYPE_FIELD.to_string(), "cutoff_date".to_string()],
            status_field: None,
            date_fields: Some(DateFields {
                start: "fromDate".to_string(),
                end: "toDate".to_string(),
                nested: None,
                required: true,
                start_required: false,
            }),
            blank: BlankValue::EmptyString,
            output: OutputFormat::FlatFile(FlatFileLayout {
                delimiter: '~',
                skip_rows: 1,
            }),
        },
    ]
}

pub fn builtin_profile(name: &str) -> Option<ReportProfile> {
    builtin_profiles().into_iter().find(|p| p.name == name)
}
