//! WMO weather interpretation codes (as returned by Open-Meteo) to text.
//!
//! See <https://open-meteo.com/en/docs#weathervariables>.

/// Descriptions are Portuguese unless `language` starts with `en`.
pub fn describe(code: i64, language: Option<&str>) -> &'static str {
    let english = language.is_some_and(|l| l.to_lowercase().starts_with("en"));
    if english { describe_en(code) } else { describe_pt(code) }
}

fn describe_pt(code: i64) -> &'static str {
    match code {
        0 => "Céu limpo",
        1 => "Predomínio de sol",
        2 => "Parcialmente nublado",
        3 => "Nublado",
        45 => "Nevoeiro",
        48 => "Nevoeiro com gelo",
        51 => "Garoa fraca",
        53 => "Garoa moderada",
        55 => "Garoa intensa",
        56 => "Garoa congelante fraca",
        57 => "Garoa congelante intensa",
        61 => "Chuva fraca",
        63 => "Chuva moderada",
        65 => "Chuva forte",
        66 => "Chuva congelante fraca",
        67 => "Chuva congelante forte",
        71 => "Neve fraca",
        73 => "Neve moderada",
        75 => "Neve forte",
        77 => "Grãos de neve",
        80 => "Aguaceiros fracos",
        81 => "Aguaceiros moderados",
        82 => "Aguaceiros fortes",
        85 => "Aguaceiros de neve fracos",
        86 => "Aguaceiros de neve fortes",
        95 => "Trovoadas",
        96 => "Trovoadas com granizo fraco",
        99 => "Trovoadas com granizo forte",
        _ => "Condição desconhecida",
    }
}

fn describe_en(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown conditions",
    }
}
