use sea_orm::entity::prelude::*;

pub mod submission {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
    pub enum Status {
        #[sea_orm(string_value = "pending")]
        Pending,
        #[sea_orm(string_value = "approved")]
        Approved,
        #[sea_orm(string_value = "rejected")]
        Rejected,
    }

    impl Status {
        pub fn label(self) -> &'static str {
            match self {
                Status::Pending => "待审核",
                Status::Approved => "已通过",
                Status::Rejected => "已拒绝",
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "qzone_submissions")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub author_id: i64,
        pub author_name: String,
        /// 来源群 (私聊投稿为 0)
        pub group_id: i64,
        pub text: String,
        /// 图片地址列表 (JSON 数组)
        pub images: String,
        pub anonymous: bool,
        pub status: Status,
        pub reason: Option<String>,
        /// 发布后的说说 tid
        pub tid: Option<String>,
        pub created_at: i64,
        pub updated_at: i64,
    }

    impl Model {
        pub fn image_list(&self) -> Vec<String> {
            serde_json::from_str(&self.images).unwrap_or_default()
        }
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
