use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    Justified,
}

impl AttendanceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(Self::Present),
            "late" => Some(Self::Late),
            "absent" => Some(Self::Absent),
            "justified" => Some(Self::Justified),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Late => "late",
            Self::Absent => "absent",
            Self::Justified => "justified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Overdue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub dob: String,
    pub monthly_fee: f64,
    pub registration_date: String,
    #[serde(default)]
    pub conditions: String,
    pub active: bool,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One mark per (student, date). Re-marking replaces the prior record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: String,
    pub date: String,
    pub status: AttendanceStatus,
}

/// One record per (student, month, year). Presence of the record is what
/// "paid this month" means; amounts are frozen at payment time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub student_id: String,
    pub month: u32,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<String>,
    pub base_amount: f64,
    pub surcharge: f64,
    pub total_paid: f64,
    pub status: PaymentStatus,
}

/// Outcome of a scholarship evaluation. Held in process memory only;
/// never written to the state document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScholarshipResult {
    pub first_place_id: String,
    pub second_place_id: String,
    pub justification: String,
    pub evaluation_date: String,
    pub used_fallback: bool,
}

/// The whole persisted snapshot: one document, rewritten on every change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcademyData {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
}

impl AcademyData {
    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    pub fn student_mut(&mut self, id: &str) -> Option<&mut Student> {
        self.students.iter_mut().find(|s| s.id == id)
    }

    pub fn payment_for(&self, student_id: &str, month: u32, year: i32) -> Option<&PaymentRecord> {
        self.payments
            .iter()
            .find(|p| p.student_id == student_id && p.month == month && p.year == year)
    }
}
