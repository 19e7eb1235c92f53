//! Sales record model and field addressing.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// One sales transaction line.
///
/// Dates are kept as strings: ingestion normalizes them to `YYYY-MM-DD` when
/// it can and otherwise passes the original text through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub row_id: i64,
    pub order_id: String,
    pub order_date: String,
    pub ship_date: String,
    pub ship_mode: String,
    pub customer_id: String,
    pub customer_name: String,
    pub segment: String,
    pub country: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub region: String,
    pub sales_rep: String,
    pub product_id: String,
    pub category: String,
    pub sub_category: String,
    pub product_name: String,
    /// Free-form flag; `"Not"` means the line was not returned.
    pub returned: String,
    pub sales: f64,
    pub quantity: i64,
    pub discount: f64,
    pub profit: f64,
}

/// Sentinel used by the `returned` column for lines that were kept.
pub const NOT_RETURNED: &str = "Not";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown field '{0}'")]
pub struct UnknownFieldError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesField {
    RowId,
    OrderId,
    OrderDate,
    ShipDate,
    ShipMode,
    CustomerId,
    CustomerName,
    Segment,
    Country,
    City,
    State,
    PostalCode,
    Region,
    SalesRep,
    ProductId,
    Category,
    SubCategory,
    ProductName,
    Returned,
    Sales,
    Quantity,
    Discount,
    Profit,
}

impl SalesField {
    pub const ALL: [SalesField; 23] = [
        SalesField::RowId,
        SalesField::OrderId,
        SalesField::OrderDate,
        SalesField::ShipDate,
        SalesField::ShipMode,
        SalesField::CustomerId,
        SalesField::CustomerName,
        SalesField::Segment,
        SalesField::Country,
        SalesField::City,
        SalesField::State,
        SalesField::PostalCode,
        SalesField::Region,
        SalesField::SalesRep,
        SalesField::ProductId,
        SalesField::Category,
        SalesField::SubCategory,
        SalesField::ProductName,
        SalesField::Returned,
        SalesField::Sales,
        SalesField::Quantity,
        SalesField::Discount,
        SalesField::Profit,
    ];

    /// Attribute name as exposed by the query API.
    pub fn name(self) -> &'static str {
        match self {
            SalesField::RowId => "row_id",
            SalesField::OrderId => "order_id",
            SalesField::OrderDate => "order_date",
            SalesField::ShipDate => "ship_date",
            SalesField::ShipMode => "ship_mode",
            SalesField::CustomerId => "customer_id",
            SalesField::CustomerName => "customer_name",
            SalesField::Segment => "segment",
            SalesField::Country => "country",
            SalesField::City => "city",
            SalesField::State => "state",
            SalesField::PostalCode => "postal_code",
            SalesField::Region => "region",
            SalesField::SalesRep => "sales_rep",
            SalesField::ProductId => "product_id",
            SalesField::Category => "category",
            SalesField::SubCategory => "sub_category",
            SalesField::ProductName => "product_name",
            SalesField::Returned => "returned",
            SalesField::Sales => "sales",
            SalesField::Quantity => "quantity",
            SalesField::Discount => "discount",
            SalesField::Profit => "profit",
        }
    }

    /// Column header used by the flat input files.
    pub fn header(self) -> &'static str {
        match self {
            SalesField::RowId => "Row ID",
            SalesField::OrderId => "Order ID",
            SalesField::OrderDate => "Order Date",
            SalesField::ShipDate => "Ship Date",
            SalesField::ShipMode => "Ship Mode",
            SalesField::CustomerId => "Customer ID",
            SalesField::CustomerName => "Customer Name",
            SalesField::Segment => "Segment",
            SalesField::Country => "Country",
            SalesField::City => "City",
            SalesField::State => "State",
            SalesField::PostalCode => "Postal Code",
            SalesField::Region => "Region",
            SalesField::SalesRep => "Sales Rep",
            SalesField::ProductId => "Product ID",
            SalesField::Category => "Category",
            SalesField::SubCategory => "Sub-Category",
            SalesField::ProductName => "Product Name",
            SalesField::Returned => "Returned",
            SalesField::Sales => "Sales",
            SalesField::Quantity => "Quantity",
            SalesField::Discount => "Discount",
            SalesField::Profit => "Profit",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            SalesField::RowId
                | SalesField::Sales
                | SalesField::Quantity
                | SalesField::Discount
                | SalesField::Profit
        )
    }

    /// Matches `name` against the known attributes, ignoring case as well as
    /// `_`, `-` and spaces. `customer_id`, `CustomerID` and `Customer ID`
    /// all resolve to [`SalesField::CustomerId`].
    pub fn parse(name: &str) -> Option<Self> {
        let key = compact(name);
        if key.is_empty() {
            return None;
        }

        // Older exports label the sales rep column "Retail Sales People".
        if key == "retailsalespeople" {
            return Some(SalesField::SalesRep);
        }

        Self::ALL
            .iter()
            .copied()
            .find(|field| compact(field.name()) == key)
    }

    pub fn resolve(name: &str) -> Result<Self, UnknownFieldError> {
        Self::parse(name).ok_or_else(|| UnknownFieldError(name.to_string()))
    }
}

impl fmt::Display for SalesField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn compact(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl SalesRecord {
    /// Textual representation of a field. Numeric fields use the shortest
    /// round-trip form, so `100.0` reads as `"100"`.
    pub fn text(&self, field: SalesField) -> Cow<'_, str> {
        match field {
            SalesField::RowId => Cow::Owned(self.row_id.to_string()),
            SalesField::OrderId => Cow::Borrowed(&self.order_id),
            SalesField::OrderDate => Cow::Borrowed(&self.order_date),
            SalesField::ShipDate => Cow::Borrowed(&self.ship_date),
            SalesField::ShipMode => Cow::Borrowed(&self.ship_mode),
            SalesField::CustomerId => Cow::Borrowed(&self.customer_id),
            SalesField::CustomerName => Cow::Borrowed(&self.customer_name),
            SalesField::Segment => Cow::Borrowed(&self.segment),
            SalesField::Country => Cow::Borrowed(&self.country),
            SalesField::City => Cow::Borrowed(&self.city),
            SalesField::State => Cow::Borrowed(&self.state),
            SalesField::PostalCode => Cow::Borrowed(&self.postal_code),
            SalesField::Region => Cow::Borrowed(&self.region),
            SalesField::SalesRep => Cow::Borrowed(&self.sales_rep),
            SalesField::ProductId => Cow::Borrowed(&self.product_id),
            SalesField::Category => Cow::Borrowed(&self.category),
            SalesField::SubCategory => Cow::Borrowed(&self.sub_category),
            SalesField::ProductName => Cow::Borrowed(&self.product_name),
            SalesField::Returned => Cow::Borrowed(&self.returned),
            SalesField::Sales => Cow::Owned(self.sales.to_string()),
            SalesField::Quantity => Cow::Owned(self.quantity.to_string()),
            SalesField::Discount => Cow::Owned(self.discount.to_string()),
            SalesField::Profit => Cow::Owned(self.profit.to_string()),
        }
    }

    /// Numeric value of a field, or `None` for text fields.
    pub fn number(&self, field: SalesField) -> Option<f64> {
        match field {
            SalesField::RowId => Some(self.row_id as f64),
            SalesField::Sales => Some(self.sales),
            SalesField::Quantity => Some(self.quantity as f64),
            SalesField::Discount => Some(self.discount),
            SalesField::Profit => Some(self.profit),
            _ => None,
        }
    }

    pub fn is_returned(&self) -> bool {
        self.returned != NOT_RETURNED
    }
}
