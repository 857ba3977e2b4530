//! Built-in bank target table.
//!
//! Covers the major Chinese card issuers with their homepage, likely
//! credit-card section URLs and link-discovery keywords. A settings
//! file may replace the whole table.

use crate::models::BankTarget;

pub fn default_banks() -> Vec<BankTarget> {
    vec![
        BankTarget::new("中国工商银行", "https://www.icbc.com.cn/")
            .with_candidates(&[
                "https://cards.icbc.com.cn/",
                "https://www.icbc.com.cn/ICBC/金融信息/信用卡/",
            ])
            .with_keywords(&["信用卡", "卡片", "信用卡中心"]),
        BankTarget::new("中国农业银行", "https://www.abchina.com/")
            .with_candidates(&[
                "https://www.abchina.com/cn/CreditCard/",
                "https://creditcard.abchina.com/",
            ])
            .with_keywords(&["信用卡", "卡片中心", "信用卡中心"]),
        BankTarget::new("中国银行", "https://www.boc.cn/")
            .with_candidates(&[
                "https://www.boc.cn/bcservice/bc1/",
                "https://www.boc.cn/creditcard/",
            ])
            .with_keywords(&["信用卡", "卡片业务", "信用卡中心"]),
        BankTarget::new("中国建设银行", "https://www.ccb.com/")
            .with_candidates(&["http://credit.ccb.com/", "https://creditcard.ccb.com/"])
            .with_keywords(&["信用卡", "龙卡", "信用卡中心"]),
        BankTarget::new("交通银行", "https://www.bankcomm.com/")
            .with_candidates(&[
                "https://creditcard.bankcomm.com/",
                "https://www.bankcomm.com/creditcard/",
            ])
            .with_keywords(&["信用卡", "沃德卡", "信用卡中心"]),
        BankTarget::new("招商银行", "https://www.cmbchina.com/")
            .with_candidates(&["http://cc.cmbchina.com/", "https://creditcard.cmbchina.com/"])
            .with_keywords(&["信用卡", "信用卡中心"]),
        BankTarget::new("浦发银行", "https://www.spdb.com.cn/")
            .with_candidates(&[
                "https://creditcard.spdb.com.cn/",
                "https://www.spdb.com.cn/creditcard/",
            ])
            .with_keywords(&["信用卡", "信用卡中心"]),
        BankTarget::new("中信银行", "https://www.citicbank.com/")
            .with_candidates(&["https://creditcard.ecitic.com/", "https://card.ecitic.com/"])
            .with_keywords(&["信用卡", "信用卡中心"]),
        BankTarget::new("中国民生银行", "https://www.cmbc.com.cn/")
            .with_candidates(&[
                "https://creditcard.cmbc.com.cn/",
                "https://www.cmbc.com.cn/cs/creditcard/",
            ])
            .with_keywords(&["信用卡", "信用卡中心"]),
        BankTarget::new("兴业银行", "https://www.cib.com.cn/")
            .with_candidates(&[
                "https://creditcard.cib.com.cn/",
                "https://www.cib.com.cn/creditcard/",
            ])
            .with_keywords(&["信用卡", "信用卡中心"]),
        BankTarget::new("平安银行", "https://bank.pingan.com/")
            .with_candidates(&[
                "https://creditcard.pingan.com/",
                "https://bank.pingan.com/creditcard/",
            ])
            .with_keywords(&["信用卡", "信用卡中心"]),
        BankTarget::new("广发银行", "https://www.cgbchina.com.cn/")
            .with_candidates(&[
                "http://card.cgbchina.com.cn/",
                "https://www.cgbchina.com.cn/creditcard/",
            ])
            .with_keywords(&["信用卡", "信用卡中心"]),
        BankTarget::new("华夏银行", "https://www.hxb.com.cn/")
            .with_candidates(&[
                "https://creditcard.hxb.com.cn/",
                "https://www.hxb.com.cn/grjr/xyk/",
            ])
            .with_keywords(&["信用卡", "信用卡中心"]),
    ]
}
