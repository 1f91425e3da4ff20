//! Text-entry state for the edit popups.

use rent_ledger_core::{Bill, BillPatch, Rates};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillField {
    Occupants,
    ElectricityOld,
    ElectricityNew,
    Paid,
    Notes,
}

impl BillField {
    const ORDER: [BillField; 5] = [
        BillField::Occupants,
        BillField::ElectricityOld,
        BillField::ElectricityNew,
        BillField::Paid,
        BillField::Notes,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BillField::Occupants => "Occupants",
            BillField::ElectricityOld => "Old reading",
            BillField::ElectricityNew => "New reading",
            BillField::Paid => "Paid",
            BillField::Notes => "Notes",
        }
    }

    fn index(self) -> usize {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ORDER[(self.index() + 1) % Self::ORDER.len()]
    }

    fn previous(self) -> Self {
        Self::ORDER[(self.index() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn parse_reading(label: &str, input: &str) -> Result<f64, String> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("{} must be a number", label))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} cannot be negative", label));
    }
    Ok(value)
}

/// Edit state for one room's bill. The original row is kept so the patch
/// only carries fields the user changed.
#[derive(Debug, Clone)]
pub struct BillForm {
    original: Bill,
    focus: BillField,
    occupants: String,
    electricity_old: String,
    electricity_new: String,
    is_paid: bool,
    notes: String,
    error: Option<String>,
}

impl BillForm {
    pub fn new(bill: &Bill) -> Self {
        Self {
            original: bill.clone(),
            focus: BillField::ElectricityNew,
            occupants: bill.occupants.to_string(),
            electricity_old: format_number(bill.electricity_old),
            electricity_new: format_number(bill.electricity_new),
            is_paid: bill.is_paid,
            notes: bill.notes.clone().unwrap_or_default(),
            error: None,
        }
    }

    pub fn bill_id(&self) -> Option<i64> {
        self.original.id
    }

    pub fn original(&self) -> &Bill {
        &self.original
    }

    pub fn focus(&self) -> BillField {
        self.focus
    }

    pub fn next_field(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn previous_field(&mut self) {
        self.focus = self.focus.previous();
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn is_paid(&self) -> bool {
        self.is_paid
    }

    /// The text shown for `field`.
    pub fn value(&self, field: BillField) -> String {
        match field {
            BillField::Occupants => self.occupants.clone(),
            BillField::ElectricityOld => self.electricity_old.clone(),
            BillField::ElectricityNew => self.electricity_new.clone(),
            BillField::Paid => (if self.is_paid { "yes" } else { "no" }).to_string(),
            BillField::Notes => self.notes.clone(),
        }
    }

    pub fn input(&mut self, c: char) {
        self.error = None;
        match self.focus {
            BillField::Occupants => {
                if c.is_ascii_digit() && self.occupants.len() < 2 {
                    self.occupants.push(c);
                }
            }
            BillField::ElectricityOld => push_decimal(&mut self.electricity_old, c),
            BillField::ElectricityNew => push_decimal(&mut self.electricity_new, c),
            BillField::Paid => {
                if c == ' ' {
                    self.is_paid = !self.is_paid;
                }
            }
            BillField::Notes => {
                if !c.is_control() {
                    self.notes.push(c);
                }
            }
        }
    }

    pub fn backspace(&mut self) {
        self.error = None;
        match self.focus {
            BillField::Occupants => {
                self.occupants.pop();
            }
            BillField::ElectricityOld => {
                self.electricity_old.pop();
            }
            BillField::ElectricityNew => {
                self.electricity_new.pop();
            }
            BillField::Paid => {}
            BillField::Notes => {
                self.notes.pop();
            }
        }
    }

    /// The bill as it would look after saving. Fields that do not parse
    /// yet keep their stored value.
    pub fn preview(&self) -> Bill {
        let mut bill = self.original.clone();
        if let Ok(occupants) = self.occupants.trim().parse() {
            bill.occupants = occupants;
        }
        if let Ok(old) = parse_reading("", &self.electricity_old) {
            bill.electricity_old = old;
        }
        if let Ok(new) = parse_reading("", &self.electricity_new) {
            bill.electricity_new = new;
        }
        bill.is_paid = self.is_paid;
        bill
    }

    pub fn to_patch(&self) -> Result<BillPatch, String> {
        let occupants: u32 = self
            .occupants
            .trim()
            .parse()
            .map_err(|_| "Occupants must be a whole number".to_string())?;
        let electricity_old = parse_reading("Old reading", &self.electricity_old)?;
        let electricity_new = parse_reading("New reading", &self.electricity_new)?;

        let original = &self.original;
        let notes = self.notes.trim();
        let original_notes = original.notes.as_deref().unwrap_or("");

        Ok(BillPatch {
            occupants: (occupants != original.occupants).then_some(occupants),
            electricity_old: (electricity_old != original.electricity_old)
                .then_some(electricity_old),
            electricity_new: (electricity_new != original.electricity_new)
                .then_some(electricity_new),
            is_paid: (self.is_paid != original.is_paid).then_some(self.is_paid),
            notes: (notes != original_notes)
                .then(|| (!notes.is_empty()).then(|| notes.to_string())),
            ..BillPatch::default()
        })
    }
}

fn push_decimal(buffer: &mut String, c: char) {
    if c.is_ascii_digit() || (c == '.' && !buffer.contains('.')) {
        if buffer == "0" && c != '.' {
            buffer.clear();
        }
        buffer.push(c);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatesField {
    Electricity,
    Water,
}

/// Bulk rate entry for the loaded month.
#[derive(Debug, Clone)]
pub struct RatesForm {
    focus: RatesField,
    electricity_rate: String,
    water_rate: String,
    error: Option<String>,
}

impl RatesForm {
    pub fn new(current: Rates) -> Self {
        Self {
            focus: RatesField::Electricity,
            electricity_rate: format_number(current.electricity_rate()),
            water_rate: format_number(current.water_rate()),
            error: None,
        }
    }

    pub fn focus(&self) -> RatesField {
        self.focus
    }

    pub fn toggle_field(&mut self) {
        self.focus = match self.focus {
            RatesField::Electricity => RatesField::Water,
            RatesField::Water => RatesField::Electricity,
        };
    }

    pub fn value(&self, field: RatesField) -> &str {
        match field {
            RatesField::Electricity => &self.electricity_rate,
            RatesField::Water => &self.water_rate,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn input(&mut self, c: char) {
        self.error = None;
        match self.focus {
            RatesField::Electricity => push_decimal(&mut self.electricity_rate, c),
            RatesField::Water => push_decimal(&mut self.water_rate, c),
        }
    }

    pub fn backspace(&mut self) {
        self.error = None;
        match self.focus {
            RatesField::Electricity => self.electricity_rate.pop(),
            RatesField::Water => self.water_rate.pop(),
        };
    }

    pub fn to_rates(&self) -> Result<Rates, String> {
        let electricity = parse_reading("Electricity rate", &self.electricity_rate)?;
        let water = parse_reading("Water rate", &self.water_rate)?;
        let rates = Rates::new(electricity, water);
        rates.validate()?;
        Ok(rates)
    }
}
