//! Fixed panel prompts.
//!
//! The prompts are in Indonesian, matching the audience of the Sectors data.
//! Each carries exactly one `{data}` placeholder.

/// Three-point executive summary for an investor.
pub const FINANCIAL_SUMMARY: &str = "\
Anda adalah seorang analis keuangan yang handal.
Berdasarkan data keuangan kuartalan berikut (dalam miliar Rupiah)

{data}

Tuliskan ringkasan eksekutif dalam 3 poin singkat untuk seorang investor.
Fokus pada:
1. Tren pertumbuhan pendapatan (revenue)
2. Tingkat profitabilitas
3. Posisi arus kas operasi
";

/// Chart selection from the closed chart enumeration.
pub const REVENUE_CHART: &str = r#"Anda adalah seorang analis yang ahli dalam visualisasi data.

Berikut adalah data pendapatan perusahaan:

{data}

Pilih jenis grafik yang paling tepat untuk menampilkan tren pendapatan tersebut.
Instruksi:
- Sumbu X adalah 'date'
- Sumbu Y adalah 'revenue'
- Nilai "kind" harus salah satu dari: line, bar, area

Tulis HANYA satu objek JSON dengan format berikut. Jangan sertakan penjelasan apapun.
{"kind": "line", "x": "date", "y": "revenue", "title": "Tren Pendapatan"}
"#;

/// Three-point interpretation of revenue, net income and operating cash flow.
pub const TREND_ANALYSIS: &str = "\
Bertindaklah sebagai seorang analis keuangan.
Berdasarkan data kuartalan berikut:
{data}
Analisis tren utama yang muncul dari data tersebut. Fokus pada pergerakan revenue, net_income, dan operating.
Sajikan analisis dalam 3 poin. Tuliskan dalam bahasa yang singkat, padat, jelas
";

/// Two or three red flags, one sentence each.
pub const RISK_ANALYSIS: &str = "\
Anda adalah seorang analis risiko keuangan yang skeptis.
Periksa data keuangan berikut dengan teliti:
{data}
Identifikasi 2-3 potensi risiko atau \"red flags\" yang perlu diwaspadai dari data tersebut.
Jelaskan dalam satu kalimat singkat
";
