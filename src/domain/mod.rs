use std::fmt::{self, Display, Formatter};
use std::num::NonZeroUsize;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Filter segment sent when no filter tokens are active.
pub const NO_FILTER: &str = "noFilter";

/// Employee identifier as issued by the backend.
///
/// The directory service has shipped both numeric and string ids, so the
/// value is kept in whichever shape it arrived in and written back the same way.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmployeeId {
    Number(u64),
    Text(String),
}

impl Display for EmployeeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for EmployeeId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("employee id cannot be empty".to_string());
        }
        Ok(match trimmed.parse::<u64>() {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Text(trimmed.to_string()),
        })
    }
}

macro_rules! region_codes {
    ($($variant:ident => $code:literal),+ $(,)?) => {
        /// US region codes accepted by the directory (50 states plus DC).
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum State {
            $(#[serde(rename = $code)] $variant,)+
        }

        impl State {
            pub const ALL: &'static [State] = &[$(State::$variant,)+];

            pub const fn code(self) -> &'static str {
                match self {
                    $(State::$variant => $code,)+
                }
            }
        }
    };
}

region_codes! {
    Al => "AL", Ak => "AK", Az => "AZ", Ar => "AR", Ca => "CA", Co => "CO",
    Ct => "CT", De => "DE", Dc => "DC", Fl => "FL", Ga => "GA", Hi => "HI",
    Id => "ID", Il => "IL", In => "IN", Ia => "IA", Ks => "KS", Ky => "KY",
    La => "LA", Me => "ME", Md => "MD", Ma => "MA", Mi => "MI", Mn => "MN",
    Ms => "MS", Mo => "MO", Mt => "MT", Ne => "NE", Nv => "NV", Nh => "NH",
    Nj => "NJ", Nm => "NM", Ny => "NY", Nc => "NC", Nd => "ND", Oh => "OH",
    Ok => "OK", Or => "OR", Pa => "PA", Ri => "RI", Sc => "SC", Sd => "SD",
    Tn => "TN", Tx => "TX", Ut => "UT", Vt => "VT", Va => "VA", Wa => "WA",
    Wv => "WV", Wi => "WI", Wy => "WY",
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for State {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_uppercase();
        State::ALL
            .iter()
            .copied()
            .find(|s| s.code() == wanted)
            .ok_or_else(|| format!("unknown state code '{}'", value.trim()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Department {
    Engineering,
    #[serde(rename = "Human Resources")]
    HumanResources,
    Legal,
    Marketing,
    Sales,
}

impl Department {
    pub const ALL: &'static [Department] = &[
        Department::Engineering,
        Department::HumanResources,
        Department::Legal,
        Department::Marketing,
        Department::Sales,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Department::Engineering => "Engineering",
            Department::HumanResources => "Human Resources",
            Department::Legal => "Legal",
            Department::Marketing => "Marketing",
            Department::Sales => "Sales",
        }
    }
}

impl Display for Department {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted: String = value
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        Department::ALL
            .iter()
            .copied()
            .find(|d| d.label().replace(' ', "").to_ascii_lowercase() == wanted)
            .ok_or_else(|| format!("unknown department '{}'", value.trim()))
    }
}

/// Everything about an employee except the server-assigned id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeFields {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub start_date: String,
    pub street: String,
    pub city: String,
    pub zipcode: String,
    pub state: State,
    pub department: Department,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: EmployeeId,
    #[serde(flatten)]
    pub fields: EmployeeFields,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortField {
    #[default]
    Id,
    FirstName,
    LastName,
    DateOfBirth,
    StartDate,
    Street,
    City,
    Zipcode,
    State,
    Department,
}

impl SortField {
    pub const ALL: &'static [SortField] = &[
        SortField::Id,
        SortField::FirstName,
        SortField::LastName,
        SortField::DateOfBirth,
        SortField::StartDate,
        SortField::Street,
        SortField::City,
        SortField::Zipcode,
        SortField::State,
        SortField::Department,
    ];

    /// Attribute name as it appears on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::FirstName => "firstName",
            SortField::LastName => "lastName",
            SortField::DateOfBirth => "dateOfBirth",
            SortField::StartDate => "startDate",
            SortField::Street => "street",
            SortField::City => "city",
            SortField::Zipcode => "zipcode",
            SortField::State => "state",
            SortField::Department => "department",
        }
    }
}

impl Display for SortField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted: String = value
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        SortField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str().to_ascii_lowercase() == wanted)
            .ok_or_else(|| format!("unknown sort field '{}'", value.trim()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{other}', expected asc or desc")),
        }
    }
}

/// Active filter tokens, in the order the viewer entered them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Filters(Vec<String>);

impl Filters {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            tokens
                .into_iter()
                .map(Into::into)
                .filter(|t| !t.trim().is_empty())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path segment form: `/` becomes `-` inside a token, tokens are joined
    /// with `_`, and an empty set is sent as `noFilter`.
    pub fn encode(&self) -> String {
        if self.0.is_empty() {
            return NO_FILTER.to_string();
        }
        self.0.iter().map(|t| t.replace('/', "-")).join("_")
    }
}

/// Cache and wire identity of one server page.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServerPageKey {
    pub page: usize,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub filter: String,
}

impl Display for ServerPageKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page={} sort={}/{} filters={}",
            self.page, self.sort_field, self.sort_order, self.filter
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPage {
    pub employees: Vec<EmployeeRecord>,
    pub total_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientPageRequest {
    pub page: usize,
    pub page_size: NonZeroUsize,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub filters: Filters,
}

impl ClientPageRequest {
    pub fn new(page: usize, page_size: NonZeroUsize) -> Self {
        Self {
            page,
            page_size,
            sort_field: SortField::default(),
            sort_order: SortOrder::default(),
            filters: Filters::default(),
        }
    }

    pub fn sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort_field = field;
        self.sort_order = order;
        self
    }

    pub fn filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// Same view, different client page.
    pub fn at_page(&self, page: usize) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    pub fn server_key(&self, server_page: usize) -> ServerPageKey {
        ServerPageKey {
            page: server_page,
            sort_field: self.sort_field,
            sort_order: self.sort_order,
            filter: self.filters.encode(),
        }
    }
}

/// One client page, cut to its exact boundaries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPage {
    pub page: usize,
    pub page_size: usize,
    pub last_page: usize,
    pub total_count: u64,
    pub server_pages: Vec<usize>,
    pub employees: Vec<EmployeeRecord>,
}
