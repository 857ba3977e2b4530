//! Prompt templates for card-name discovery and card-detail extraction.
//!
//! Both prompts demand a bare JSON answer; the client still strips a
//! code fence because models wrap JSON in one anyway.

/// System role content sent with every chat request.
pub const SYSTEM_PROMPT: &str = "你是一个专业的信用卡信息提取助手，只输出JSON，不输出任何解释。";

/// Template for extracting card names from search results.
/// Placeholders: `{bank}`, `{results}`.
const CARD_NAMES_PROMPT: &str = r#"以下是关于"{bank}信用卡"的网络搜索结果（JSON格式）：

{results}

请从搜索结果中提取{bank}发行的信用卡产品名称。要求：
1. 只提取具体的信用卡产品名称，例如"XX银行白金信用卡"
2. 去掉重复的卡片
3. 不要包含借记卡、储蓄卡或其他银行的卡片
4. 最多列出10个

只输出一个JSON数组，例如：
["XX白金卡", "XX金卡"]"#;

/// Template for extracting one card's structured fields.
/// Placeholders: `{bank}`, `{card}`, `{results}`.
const CARD_DETAIL_PROMPT: &str = r#"以下是关于"{bank} {card}"的网络搜索结果（JSON格式）：

{results}

请根据搜索结果提取这张信用卡的详细信息，输出一个JSON对象，字段如下：
{
  "level": "卡片等级（普卡/金卡/白金卡/钻石卡等，未知则为null）",
  "card_type": "卡组织或卡片类型（未知则为null）",
  "annual_fee": "年费政策描述（未知则为null）",
  "points_rule": "积分规则描述（未知则为null）",
  "credit_limit": "额度范围描述（未知则为null）",
  "benefits": {"权益名称": "权益说明"},
  "requirements": {"申请条件名称": "条件说明"}
}

要求：
1. 只依据搜索结果中的信息，不要编造
2. benefits列出主要权益（至少3个，如机场贵宾厅、积分优惠、消费返现等）；搜索结果确实没有权益信息时才输出空对象{}
3. requirements没有信息时输出空对象{}
4. 只输出JSON对象本身"#;

/// Render the card-name discovery prompt for one bank.
pub fn card_names_prompt(bank: &str, results_json: &str) -> String {
    CARD_NAMES_PROMPT
        .replace("{bank}", bank)
        .replace("{results}", results_json)
}

/// Render the detail-extraction prompt for one card.
pub fn card_detail_prompt(bank: &str, card: &str, results_json: &str) -> String {
    CARD_DETAIL_PROMPT
        .replace("{bank}", bank)
        .replace("{card}", card)
        .replace("{results}", results_json)
}
