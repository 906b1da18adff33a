use serde::Deserialize;
use serde_json::Value;
use time::{macros::format_description, Date, Time};

use crate::db::chatbot::{Field, Slots};

/// Instruction asking the model to pull booking slots out of `message`.
pub fn extraction_prompt(message: &str, today: Date) -> String {
    format!(
        "Extract bus booking details from this Vietnamese message and answer \
         with a single JSON object using only these keys:\n\
         - departure_station: departure city or station name (e.g. \"Hà Nội\")\n\
         - arrival_station: arrival city or station name\n\
         - departure_date: date as YYYY-MM-DD; convert phrases like \
           \"ngày 7 tháng 10\" and assume year {year} when none is given \
           (today is {today})\n\
         - departure_time: time as HH:MM, 24-hour clock\n\
         Leave out keys the message does not mention.\n\n\
         Message: \"{message}\"",
        year = today.year(),
    )
}

#[derive(Default, Deserialize)]
struct Raw {
    departure_station: Option<Value>,
    arrival_station: Option<Value>,
    departure_date: Option<Value>,
    departure_time: Option<Value>,
}

/// Reads the slots out of a model reply: the text from its first `{` to its
/// last `}` is parsed as JSON. Anything unparseable yields no slots; blank
/// values, dates other than `YYYY-MM-DD` and times other than `HH:MM` are
/// dropped one by one.
pub fn parse_extraction(reply: &str) -> Slots {
    let raw = reply
        .find('{')
        .zip(reply.rfind('}'))
        .filter(|(start, end)| start < end)
        .and_then(|(start, end)| {
            serde_json::from_str::<Raw>(&reply[start..=end]).ok()
        })
        .unwrap_or_default();

    Slots {
        departure_station: text(raw.departure_station),
        arrival_station: text(raw.arrival_station),
        departure_date: text(raw.departure_date).filter(|d| parse_date(d).is_some()),
        departure_time: text(raw.departure_time).filter(|t| {
            Time::parse(t, format_description!("[hour]:[minute]")).is_ok()
        }),
    }
}

fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_owned()).filter(|s| !s.is_empty()),
        _ => None,
    }
}

pub fn parse_date(date: &str) -> Option<Date> {
    Date::parse(date, format_description!("[year]-[month]-[day]")).ok()
}

/// Overlays this turn's extraction on what was collected before.
pub fn fuse(collected: Slots, extracted: Slots) -> Slots {
    Slots {
        departure_station: extracted
            .departure_station
            .or(collected.departure_station),
        arrival_station: extracted.arrival_station.or(collected.arrival_station),
        departure_date: extracted.departure_date.or(collected.departure_date),
        departure_time: extracted.departure_time.or(collected.departure_time),
    }
}

/// Required slots still unknown, in asking order.
pub fn missing(slots: &Slots) -> Vec<Field> {
    [
        (Field::DepartureStation, &slots.departure_station),
        (Field::ArrivalStation, &slots.arrival_station),
        (Field::DepartureDate, &slots.departure_date),
    ]
    .into_iter()
    .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
    .map(|(field, _)| field)
    .collect()
}

/// How a missing slot is named to the traveller.
pub const fn label(field: Field) -> &'static str {
    match field {
        Field::DepartureStation => "điểm đi",
        Field::ArrivalStation => "điểm đến",
        Field::DepartureDate => "ngày đi",
    }
}
