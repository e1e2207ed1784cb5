use finrag_llm::Sampling;
use serde_json::{json, Value};

/// Prompt texts are written in Russian, the language of the source reports.
pub const METRICS_SYSTEM_PROMPT: &str =
    "Вы — эксперт по финансовой отчетности. Вы разговариваете на русском языке.";

pub const METRICS_INSTRUCTIONS: &str = r#"Извлеките все важные данные:
- финансовые показатели
- аналитика
- деятельность компании
- решения руководства
- политика компании
- приобретения
- движение денежных средств
- инвестиции.

СТРОГО верните данные в формате JSON:
{
    "metrics": [
        {"value": "данные"}
    ]
}

Правила:
1. НИКАКИХ дополнительных текстов
2. Если это финансовая метрика, то оставлять ТОЧНОЕ название метрики и ее значение
3. ТОЛЬКО реальные числа из документа
4. ТОЧНЫЕ названия как в документе
5. Сохранять единицы измерения (тыс. руб., млн руб., тыс. дол.)
6. ТОЛЬКО важные аналитические данные

Что НЕ включать:
- Абстрактные определения без отчетных данных
- Пустые значения
- Значения не имеющие смысла
- Заголовки разделов без значений
- Метрики без числовых значений
- Промежуточные итоги разделов
- Пояснительные комментарии

Пример ответа:
{
    "metrics": [
        {"value": "Выручка: 180245623 тыс. руб."},
        {"value": "Прибыль: 33381467 тыс. руб."},
        {"value": "Приобретение «Дагтелекома» в январе 2009 года за 51 млн долл. США"}
    ]
}
Вот текст:
"#;

pub const REPORT_TYPE_SYSTEM_PROMPT: &str = r#"Вы — эксперт по анализу финансовой отчетности. Определите тип отчета из первой страницы документа.

СТРОГО верните данные в формате JSON:
{
    "report_type": "тип_отчета"
}

Примеры вывода:
1. {"report_type": "Аудиторское заключение о бухгалтерской отчетности за 2010 год"}
2. {"report_type": "бухгалтерский баланс НА 30 июня 2023 года"}
3. {"report_type": "ОТЧЕТ О ФИНАНСОВЫХ РЕЗУЛЬТАТАХ за 1-е полугодие 2021 года"}
4. {"report_type": "Консолидированная финансовая отчетность по состоянию на 31 декабря 2013 и 2012 годов"}"#;

pub const METRICS_SAMPLING: Sampling = Sampling {
    frequency_penalty: 1.0,
    temperature: 0.2,
    max_tokens: 10_000,
};

pub const REPORT_TYPE_SAMPLING: Sampling = Sampling {
    frequency_penalty: 0.5,
    temperature: 0.1,
    max_tokens: 5_000,
};

pub const ANSWER_SAMPLING: Sampling = Sampling {
    frequency_penalty: 0.5,
    temperature: 0.1,
    max_tokens: 5_000,
};

pub fn metrics_schema() -> Value {
    json!({
        "title": "Generated schema for Root",
        "type": "object",
        "properties": {
            "metrics": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "value": { "type": "string" }
                    },
                    "required": ["value"]
                }
            }
        },
        "required": ["metrics"]
    })
}

pub fn report_type_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "report_type": { "type": "string" }
        },
        "required": ["report_type"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_RETRIEVAL_QUERY;

    #[test]
    fn prompts_match_document_language() {
        assert!(METRICS_SYSTEM_PROMPT.contains("на русском языке"));
        assert!(METRICS_INSTRUCTIONS.contains("ТОЧНЫЕ названия как в документе"));
        assert!(METRICS_INSTRUCTIONS.ends_with("Вот текст:\n"));
        assert!(REPORT_TYPE_SYSTEM_PROMPT.contains("\"report_type\""));
        assert!(DEFAULT_RETRIEVAL_QUERY.starts_with("Дай все данные компании МТС"));
    }
}
